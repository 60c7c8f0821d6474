//! QueueMessage - ブローカーから受け取った 1 件の配送
//!
//! body（bytes）・delivery tag・durable フラグだけを運ぶ。
//! decode は Delivery Loop の責務なので、ここでは bytes のまま保持する。

use std::str::Utf8Error;

use super::DeliveryTag;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    body: Vec<u8>,
    delivery_tag: DeliveryTag,
    durable: bool,
}

impl QueueMessage {
    pub fn new(body: Vec<u8>, delivery_tag: DeliveryTag, durable: bool) -> Self {
        Self {
            body,
            delivery_tag,
            durable,
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn delivery_tag(&self) -> DeliveryTag {
        self.delivery_tag
    }

    pub fn is_durable(&self) -> bool {
        self.durable
    }

    /// Decode the body as UTF-8 alert text.
    pub fn decode_text(&self) -> Result<&str, Utf8Error> {
        std::str::from_utf8(&self.body)
    }
}
