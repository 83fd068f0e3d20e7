// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! Runs every route of the content router until interrupted.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use content_router::{
    channel::new_amqp_channel,
    configs::Configs,
    consumer::consume_into,
    dispatcher::Dispatcher,
    http::ReqwestTransport,
    publisher::RabbitMQPublisher,
    routes::{
        characters::{install_characters_topology, publish_characters},
        feed,
        tables::{characters_table, choice_table, dynamic_api_table},
        timer::{greeting_route, sequence_route, SequenceCounter, Timer},
        transform, CHOICE_SAMPLES, DYNAMIC_API_SAMPLES, GREETING, UPPERCASE_SAMPLE,
    },
};
use std::{sync::Arc, time::Duration};
use tokio::{sync::mpsc, task::JoinSet};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
    #[default]
    Compact,
}

/// Unset options keep the defaults of `Configs`.
#[derive(Debug, Parser)]
#[command(name = "content-router", version, about = "Content-based message routes")]
struct Cli {
    #[arg(long, env = "APP_NAME")]
    app_name: Option<String>,

    #[arg(long, env = "RABBITMQ_HOST")]
    rabbitmq_host: Option<String>,

    #[arg(long, env = "RABBITMQ_PORT")]
    rabbitmq_port: Option<u16>,

    #[arg(long, env = "RABBITMQ_USERNAME")]
    rabbitmq_username: Option<String>,

    #[arg(long, env = "RABBITMQ_PASSWORD", hide_env_values = true)]
    rabbitmq_password: Option<String>,

    #[arg(long, env = "RABBITMQ_VHOST")]
    rabbitmq_vhost: Option<String>,

    /// Endpoint called with POST for user messages
    #[arg(long, env = "API_A_URL")]
    api_a_url: Option<String>,

    /// Endpoint called with PUT for admin messages
    #[arg(long, env = "API_B_URL")]
    api_b_url: Option<String>,

    #[arg(long, env = "HTTP_TIMEOUT_MS")]
    http_timeout_ms: Option<u64>,

    /// Maximum concurrent dispatches per route
    #[arg(long, env = "DISPATCH_WORKERS")]
    workers: Option<usize>,

    #[arg(long, env = "DISPATCH_TIMEOUT_MS")]
    dispatch_timeout_ms: Option<u64>,

    /// Queue whose messages are fed to the dynamic API route
    #[arg(long, env = "CONSUME_QUEUE")]
    consume_queue: Option<String>,

    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    /// -v for debug, -vv for trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn configs(&self) -> Configs {
        let mut cfg = Configs::default();

        if let Some(v) = &self.app_name {
            cfg.app.name = v.clone();
        }
        if let Some(v) = &self.rabbitmq_host {
            cfg.rabbitmq.host = v.clone();
        }
        if let Some(v) = self.rabbitmq_port {
            cfg.rabbitmq.port = v;
        }
        if let Some(v) = &self.rabbitmq_username {
            cfg.rabbitmq.user = v.clone();
        }
        if let Some(v) = &self.rabbitmq_password {
            cfg.rabbitmq.password = v.clone();
        }
        if let Some(v) = &self.rabbitmq_vhost {
            cfg.rabbitmq.vhost = v.clone();
        }
        if let Some(v) = &self.api_a_url {
            cfg.http.api_a_url = v.clone();
        }
        if let Some(v) = &self.api_b_url {
            cfg.http.api_b_url = v.clone();
        }
        if let Some(v) = self.http_timeout_ms {
            cfg.http.timeout_ms = v;
        }
        if let Some(v) = self.workers {
            cfg.dispatch.workers = v;
        }
        if let Some(v) = self.dispatch_timeout_ms {
            cfg.dispatch.timeout_ms = v;
        }

        cfg
    }
}

fn init_logging(cli: &Cli) -> Result<()> {
    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let fmt_layer = match cli.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli)?;

    let cfg = cli.configs();
    cfg.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        app = cfg.app.name,
        "content router starting"
    );

    let workers = cfg.dispatch.workers;
    let http = Arc::new(ReqwestTransport::new(millis(cfg.http.timeout_ms))?);

    let choice = Dispatcher::builder(choice_table()?)
        .timeout(cfg.dispatch.timeout())
        .build()?;
    let dynamic_api = Dispatcher::builder(dynamic_api_table(&cfg.http)?)
        .http(http)
        .timeout(cfg.dispatch.timeout())
        .build()?;

    let mut routes = JoinSet::new();

    routes.spawn(async {
        let counter = SequenceCounter::new();
        sequence_route(
            Timer::new("sequence").delay(millis(3_000)).period(millis(3_000)),
            &counter,
        )
        .await;
    });

    routes.spawn(async {
        greeting_route(Timer::new("greeting").repeat(10), GREETING).await;
    });

    let (fixed_tx, fixed_rx) = mpsc::channel(workers);
    routes.spawn(async move {
        transform::process_route(fixed_rx, transform::fixed_text).await;
    });
    routes.spawn(async move {
        feed(fixed_tx, Timer::new("fixed-text").repeat(1), "").await;
    });

    let (upper_tx, upper_rx) = mpsc::channel(workers);
    routes.spawn(async move {
        transform::process_route(upper_rx, transform::uppercase).await;
    });
    routes.spawn(async move {
        feed(
            upper_tx,
            Timer::new("uppercase")
                .delay(millis(2_000))
                .period(millis(2_000))
                .repeat(10),
            UPPERCASE_SAMPLE,
        )
        .await;
    });

    let (choice_tx, choice_rx) = mpsc::channel(workers * 4);
    routes.spawn(async move {
        choice.run(choice_rx, workers).await;
    });
    for (body, delay) in CHOICE_SAMPLES {
        let tx = choice_tx.clone();
        routes.spawn(async move {
            feed(tx, Timer::new("choice").delay(millis(delay)).repeat(1), body).await;
        });
    }
    drop(choice_tx);

    let (api_tx, api_rx) = mpsc::channel(workers * 4);
    let api_runner = dynamic_api.clone();
    routes.spawn(async move {
        api_runner.run(api_rx, workers).await;
    });
    for (body, delay) in DYNAMIC_API_SAMPLES {
        let tx = api_tx.clone();
        routes.spawn(async move {
            feed(tx, Timer::new("dynamic-api").delay(millis(delay)).repeat(1), body).await;
        });
    }
    drop(api_tx);

    // held for the lifetime of the broker routes
    let _connection = match new_amqp_channel(&cfg).await {
        Ok((connection, channel)) => {
            install_characters_topology(channel.clone()).await;

            let characters = Dispatcher::builder(characters_table()?)
                .publisher(RabbitMQPublisher::new(channel.clone()))
                .timeout(cfg.dispatch.timeout())
                .build()?;

            routes.spawn(async move {
                Timer::new("characters")
                    .delay(millis(2_000))
                    .repeat(1)
                    .run(|_| {
                        let dispatcher = characters.clone();
                        async move {
                            let sent = publish_characters(&dispatcher).await;
                            info!(sent, "characters published");
                        }
                    })
                    .await;
            });

            if let Some(queue) = cli.consume_queue.clone() {
                let tag = cfg.app.name.clone();
                routes.spawn(async move {
                    if let Err(err) =
                        consume_into(channel, &queue, &tag, dynamic_api, workers).await
                    {
                        error!(error = err.to_string(), queue, "consumer stopped");
                    }
                });
            }

            Some(connection)
        }
        Err(err) => {
            warn!(error = err.to_string(), "rabbitmq unavailable, broker routes disabled");
            None
        }
    };

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(err) = res {
                error!(error = err.to_string(), "failure to listen for ctrl-c");
            }
            info!("shutdown requested");
        }
        _ = async { while routes.join_next().await.is_some() {} } => {
            info!("all routes finished");
        }
    }

    routes.shutdown().await;
    Ok(())
}
