//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![warn(rust_2018_idioms)]

mod config;

use clap::{App, Arg};
use config::{Config, LoggingFmtStyle};
use lacpd::master::{EngineConfig, Master, OutputChannelsTx};
use lacpd::packet::SystemId;
use lacpd::tasks::messages::input::ProtocolMsg;
use lacpd::tasks::messages::output::PduTxMsg;
use lacpd_utils::mac_addr::MacAddr;
use tokio::sync::mpsc;
use tracing::level_filters::LevelFilter;
use tracing::{debug, info};
use tracing_subscriber::Layer;
use tracing_subscriber::prelude::*;

fn init_tracing(config: &config::Logging) {
    // Enable logging to stdout.
    let stdout = config.stdout.enabled.then(|| {
        let log_level_filter = LevelFilter::from_level(tracing::Level::TRACE);
        let layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(config.stdout.show_thread_id)
            .with_file(config.stdout.show_source)
            .with_line_number(config.stdout.show_source)
            .with_ansi(config.stdout.colors);
        let layer = match config.stdout.style {
            LoggingFmtStyle::Compact => layer.compact().boxed(),
            LoggingFmtStyle::Full => layer.boxed(),
            LoggingFmtStyle::Json => layer.json().boxed(),
            LoggingFmtStyle::Pretty => layer.pretty().boxed(),
        };
        layer.with_filter(log_level_filter)
    });

    // Configure the tracing fmt layer.
    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive("lacpd=debug".parse().unwrap())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout)
        .init();
}

// ===== main =====

fn main() {
    // Parse command-line parameters.
    let matches = App::new("LACP daemon")
        .version(clap::crate_version!())
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("file")
                .help("Specify an alternative configuration file."),
        )
        .get_matches();

    // Read configuration file.
    let config_file = matches.value_of("config");
    let config = Config::load(config_file);

    // Initialize tracing.
    init_tracing(&config.logging);

    let system_mac = config
        .system
        .mac
        .parse::<MacAddr>()
        .expect("Failed to parse actor system MAC address");
    let engine_config = EngineConfig {
        system: SystemId::new(config.system.priority, system_mac),
    };

    // Set panic handler to abort the process if any child task panics.
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        default_panic(info);
        std::process::exit(1);
    }));

    // We're ready to go!
    info!("starting up");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to create async runtime")
        .block_on(async {
            let (input_tx, input_rx) = Master::input_channels();
            let (southbound_tx, mut southbound_rx) = mpsc::unbounded_channel();
            let (pdu_tx, mut pdu_rx) = mpsc::unbounded_channel::<PduTxMsg>();

            // The data-path and packet-out sinks belong to the platform
            // integration; here they only trace what the engine decided.
            tokio::spawn(async move {
                while let Some(command) = southbound_rx.recv().await {
                    debug!(?command, "forwarding-plane command");
                }
            });
            tokio::spawn(async move {
                while let Some(pdu) = pdu_rx.recv().await {
                    debug!(port = %pdu.port_handle, "PDU out");
                }
            });

            let master = Master::new(
                engine_config,
                OutputChannelsTx::new(southbound_tx, pdu_tx),
            );
            let dispatcher =
                tokio::spawn(master.run(input_rx, input_tx.clone()));

            tokio::signal::ctrl_c()
                .await
                .expect("failed to listen for shutdown signal");
            info!("shutting down");
            let _ = input_tx.send(ProtocolMsg::Shutdown).await;
            let _ = dispatcher.await;
        });
}
