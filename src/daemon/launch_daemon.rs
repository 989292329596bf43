// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Daemon Management Module
//!
//! Starts every enabled service from one configuration and stops them
//! together:
//!
//! - Ingestion worker draining the upload queue
//! - HTTP API server
//! - Modbus TCP server
//! - Heartbeat logging ingestion statistics
//!
//! All services share one [`MonitorState`].

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_modbus::server::tcp::{accept_tcp_connection, Server};

use crate::config::Config;
use crate::modbus::MainsModbusServer;
use crate::processing::{IngestionConsumer, IngestionHandle, MonitorState};
use crate::visualization::server::{build_rocket, figment_from_config};

/// Represents the set of running services
pub struct Daemon {
    tasks: Vec<JoinHandle<Result<()>>>,
    running: Arc<AtomicBool>,
    state: Option<MonitorState>,
    consumer: Option<IngestionConsumer>,
    web_shutdown: Option<rocket::Shutdown>,
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

impl Daemon {
    /// Create a new daemon instance
    pub fn new() -> Self {
        Daemon {
            tasks: Vec::new(),
            running: Arc::new(AtomicBool::new(true)),
            state: None,
            consumer: None,
            web_shutdown: None,
        }
    }

    /// Launch all configured tasks based on configuration
    pub async fn launch(&mut self, config: &Config) -> Result<()> {
        let state = MonitorState::new(config);
        let mut consumer = IngestionConsumer::new(state.clone(), &config.acquisition);

        if config.acquisition.enabled {
            let task = consumer.start()?;
            self.tasks.push(task);
        } else {
            warn!("Ingestion worker disabled, uploads will be refused once the queue is full");
        }

        if config.visualization.enabled {
            self.start_web_server(config, state.clone(), consumer.handle())
                .await?;
        }

        if config.modbus.enabled {
            self.start_modbus_server(config, state.clone())?;
        }

        self.start_heartbeat(config, &consumer, state.clone())?;

        self.state = Some(state);
        self.consumer = Some(consumer);
        Ok(())
    }

    /// Shared monitor state, available once launched
    pub fn state(&self) -> Option<&MonitorState> {
        self.state.as_ref()
    }

    /// Producer handle of the ingestion queue, available once launched
    pub fn ingestion_handle(&self) -> Option<IngestionHandle> {
        self.consumer.as_ref().map(IngestionConsumer::handle)
    }

    /// Start the Rocket web server
    async fn start_web_server(
        &mut self,
        config: &Config,
        state: MonitorState,
        ingestion: IngestionHandle,
    ) -> Result<()> {
        info!(
            "Starting web server on {}:{}",
            config.visualization.address, config.visualization.port
        );

        let figment = figment_from_config(&config.visualization);
        let ignited = build_rocket(figment, state, ingestion)
            .ignite()
            .await
            .context("Failed to ignite web server")?;
        self.web_shutdown = Some(ignited.shutdown());

        let task = tokio::spawn(async move {
            ignited.launch().await?;
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Start the Modbus TCP server
    fn start_modbus_server(&mut self, config: &Config, state: MonitorState) -> Result<()> {
        info!(
            "Starting modbus server on {}:{}",
            config.modbus.address, config.modbus.port
        );
        let socket_addr: SocketAddr = format!("{}:{}", config.modbus.address, config.modbus.port)
            .parse()
            .with_context(|| {
                format!(
                    "Invalid Modbus socket address {}:{}",
                    config.modbus.address, config.modbus.port
                )
            })?;
        let running = self.running.clone();

        let task = tokio::spawn(async move {
            let listener = TcpListener::bind(socket_addr).await?;
            let server = Server::new(listener);

            let on_connected = move |stream, socket_addr| {
                let state = state.clone();
                async move {
                    accept_tcp_connection(stream, socket_addr, move |_socket_addr| {
                        Ok(Some(MainsModbusServer::with_state(&state)))
                    })
                }
            };

            let on_process_error = |err| {
                error!("Modbus server error: {err}");
            };

            let server_handle = tokio::spawn(async move {
                if let Err(e) = server.serve(&on_connected, on_process_error).await {
                    error!("Modbus server error: {}", e);
                }
            });

            while running.load(Ordering::SeqCst) {
                time::sleep(Duration::from_millis(250)).await;
            }

            info!("Shutting down Modbus server...");
            server_handle.abort();
            match time::timeout(Duration::from_secs(5), server_handle).await {
                Ok(_) => info!("Modbus server shut down successfully"),
                Err(_) => warn!("Modbus server shutdown timed out, forcing termination"),
            }

            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Start a heartbeat task that logs ingestion status periodically
    fn start_heartbeat(
        &mut self,
        config: &Config,
        consumer: &IngestionConsumer,
        state: MonitorState,
    ) -> Result<()> {
        debug!("Starting heartbeat monitor");

        let period = Duration::from_secs(config.acquisition.heartbeat_secs.max(1));
        let statistics = consumer.statistics_source();
        let running = self.running.clone();
        let task = tokio::spawn(async move {
            let tick = Duration::from_millis(250);
            let mut elapsed = Duration::ZERO;
            while running.load(Ordering::SeqCst) {
                time::sleep(tick).await;
                elapsed += tick;
                if elapsed < period {
                    continue;
                }
                elapsed = Duration::ZERO;

                let stats = statistics();
                info!(
                    "Daemon heartbeat: {} batches retained, {} uploads received, {} stored, {} failed, {} rejected",
                    state.store().len().await,
                    stats.tasks_received,
                    stats.tasks_stored,
                    stats.tasks_failed,
                    stats.tasks_rejected
                );
            }
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Stop all running tasks
    pub fn shutdown(&self) {
        info!("Shutting down daemon tasks");
        self.running.store(false, Ordering::SeqCst);
        if let Some(consumer) = &self.consumer {
            consumer.stop();
        }
        if let Some(shutdown) = &self.web_shutdown {
            shutdown.clone().notify();
        }
    }

    /// Wait for all tasks to complete
    pub async fn join(self) -> Result<()> {
        for task in self.tasks {
            match task.await {
                Ok(Err(e)) => error!("Task failed: {}", e),
                Err(e) => error!("Task panicked: {}", e),
                Ok(Ok(())) => {}
            }
        }
        Ok(())
    }
}
