use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use pacer_core::app::{ExitStatus, LoopBuilder, Shutdown, ShutdownSignal};
use pacer_core::config::{AuthFailurePolicy, BrokerConfig, DeliveryConfig, FirstPollPolicy, PollConfig};
use pacer_core::domain::{PhoneNumber, PipelineError};
use pacer_core::impls::twilio::DEFAULT_BASE_URL;
use pacer_core::impls::{
    AmqpPublisher, AmqpSubscriber, ConnectApiSource, FileSessionProvider, TwilioCredentials,
    TwilioNotifier,
};
use pacer_core::retry::RetryPolicy;

/// pacer: texts you when a new fitness activity shows up.
///
/// `produce` polls the activity API and queues an alert for every new
/// activity; `consume` drains the queue and sends each alert as an SMS.
#[derive(Parser)]
#[command(name = "pacer", version, about)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the activity API and publish alerts to the queue
    Produce(ProduceArgs),

    /// Receive alerts from the queue and send them as text messages
    Consume(ConsumeArgs),
}

#[derive(Args)]
struct BrokerArgs {
    /// AMQP broker url
    #[arg(long, env = "AMQP_URL", default_value = "amqp://localhost:5672/%2f")]
    amqp_url: String,

    /// Durable queue carrying the alerts
    #[arg(long, env = "ALERT_QUEUE", default_value = "activity-alerts")]
    queue: String,

    /// Extra broker connection attempts at startup
    #[arg(long, env = "CONNECT_RETRIES", default_value_t = 0)]
    connect_retries: u32,
}

impl BrokerArgs {
    fn to_config(&self, prefetch: u16) -> BrokerConfig {
        BrokerConfig {
            url: self.amqp_url.clone(),
            queue: self.queue.clone(),
            prefetch,
            connect_retries: self.connect_retries,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Args)]
struct ProduceArgs {
    #[command(flatten)]
    broker: BrokerArgs,

    /// Base url of the activity API
    #[arg(long, env = "ACTIVITY_API_URL", default_value = "https://connectapi.garmin.com")]
    activity_api_url: String,

    /// Cached session JSON written by the login tool
    #[arg(long, env = "SESSION_FILE", default_value = "session.json")]
    session_file: PathBuf,

    /// Seconds between polls
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = 300)]
    poll_interval_secs: u64,

    /// Floor for the poll interval; the API rejects faster polling
    #[arg(long, env = "MIN_POLL_INTERVAL_SECS", default_value_t = 120)]
    min_poll_interval_secs: u64,

    /// What to do with the first activity seen after start (announce | baseline)
    #[arg(long, env = "FIRST_POLL", default_value = "announce")]
    first_poll: FirstPollPolicy,

    /// What to do when the API rejects the session (exit | wait)
    #[arg(long, env = "ON_AUTH_FAILURE", default_value = "exit")]
    on_auth_failure: AuthFailurePolicy,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 30)]
    http_timeout_secs: u64,
}

#[derive(Args)]
struct ConsumeArgs {
    #[command(flatten)]
    broker: BrokerArgs,

    /// Unacknowledged deliveries the broker may push at once
    #[arg(long, env = "PREFETCH", default_value_t = 1)]
    prefetch: u16,

    /// Number every alert is texted to (E.164)
    #[arg(long, env = "ALERT_TO")]
    alert_to: PhoneNumber,

    /// Sending number (E.164)
    #[arg(long, env = "TWILIO_FROM")]
    twilio_from: PhoneNumber,

    #[arg(long, env = "TWILIO_ACCOUNT_SID")]
    twilio_account_sid: String,

    #[arg(long, env = "TWILIO_AUTH_TOKEN", hide_env_values = true)]
    twilio_auth_token: String,

    /// Base url of the carrier API
    #[arg(long, env = "TWILIO_API_URL", default_value = DEFAULT_BASE_URL)]
    twilio_api_url: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 30)]
    http_timeout_secs: u64,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pacer=info,warn"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Trigger `shutdown` on Ctrl-C / SIGINT.
fn spawn_interrupt_handler(shutdown: Shutdown) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received, shutting down");
                shutdown.trigger();
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for interrupts; stop the process with a signal");
                // keep the sender alive so the loops are not stopped
                std::future::pending::<()>().await;
            }
        }
    });
}

async fn produce(args: ProduceArgs, mut signal: ShutdownSignal) -> Result<()> {
    let broker = args.broker.to_config(1);
    broker.validate()?;
    let poll = PollConfig {
        poll_interval: Duration::from_secs(args.poll_interval_secs),
        min_poll_interval: Duration::from_secs(args.min_poll_interval_secs),
        first_poll: args.first_poll,
        on_auth_failure: args.on_auth_failure,
    };
    poll.validate()?;

    let source = ConnectApiSource::new(
        &args.activity_api_url,
        Duration::from_secs(args.http_timeout_secs),
    )?;
    let sessions = FileSessionProvider::new(args.session_file);

    let publisher = tokio::select! {
        _ = signal.recv() => return Ok(()),
        publisher = AmqpPublisher::connect(&broker) => publisher?,
    };

    let poll_loop = LoopBuilder::new()
        .source(Box::new(source))
        .sessions(Box::new(sessions))
        .publisher(Box::new(publisher))
        .poll_config(poll)
        .build_producer()?;
    poll_loop.run(signal).await?;
    Ok(())
}

async fn consume(args: ConsumeArgs, mut signal: ShutdownSignal) -> Result<()> {
    let broker = args.broker.to_config(args.prefetch);
    broker.validate()?;

    let notifier = TwilioNotifier::new(
        &args.twilio_api_url,
        TwilioCredentials {
            account_sid: args.twilio_account_sid,
            auth_token: args.twilio_auth_token,
            from: args.twilio_from,
        },
        Duration::from_secs(args.http_timeout_secs),
    )?;

    let subscription = tokio::select! {
        _ = signal.recv() => return Ok(()),
        subscription = AmqpSubscriber::connect(&broker) => subscription?,
    };

    let delivery_loop = LoopBuilder::new()
        .subscription(Box::new(subscription))
        .notifier(Box::new(notifier))
        .delivery_config(DeliveryConfig {
            destination: args.alert_to,
        })
        .build_consumer()?;
    delivery_loop.run(signal).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();
    spawn_interrupt_handler(shutdown);

    let result = match cli.command {
        Commands::Produce(args) => produce(args, signal).await,
        Commands::Consume(args) => consume(args, signal).await,
    };

    match result {
        Ok(()) => {
            info!("closed connection, goodbye");
            ExitCode::from(ExitStatus::Shutdown.code())
        }
        Err(err) => {
            error!(error = %err, "fatal error");
            eprintln!("\nERROR: {err:#}\n");
            let code = err
                .downcast_ref::<PipelineError>()
                .map(PipelineError::exit_code)
                .unwrap_or(ExitStatus::Fatal.code());
            ExitCode::from(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn produce_defaults() {
        let cli = Cli::try_parse_from(["pacer", "produce"]).unwrap();
        let Commands::Produce(args) = cli.command else {
            panic!("expected produce");
        };
        assert_eq!(args.first_poll, FirstPollPolicy::Announce);
        assert_eq!(args.on_auth_failure, AuthFailurePolicy::Exit);
        assert_eq!(args.poll_interval_secs, 300);
        assert_eq!(args.broker.to_config(1).queue, "activity-alerts");
    }

    #[test]
    fn consume_rejects_bad_phone_numbers() {
        let parsed = Cli::try_parse_from([
            "pacer",
            "consume",
            "--alert-to",
            "5551234567",
            "--twilio-from",
            "+14793832936",
            "--twilio-account-sid",
            "AC1",
            "--twilio-auth-token",
            "t",
        ]);
        assert!(parsed.is_err());
    }
}
