// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use std::path::PathBuf;

use rocket::config::LogLevel;
use rocket::data::{Limits, ToByteUnit};
use rocket::fairing::{Fairing, Info, Kind};
use rocket::figment::Figment;
use rocket::http::Header;
use rocket::{catchers, options, routes, Build, Request, Response, Rocket};

use super::api;
use crate::config::VisualizationConfig;
use crate::processing::{IngestionHandle, MonitorState};

pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
    fn info(&self) -> Info {
        Info {
            name: "Add CORS headers to responses",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "POST, GET, OPTIONS",
        ));
        response.set_header(Header::new("Access-Control-Allow-Headers", "*"));
        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

/// CORS preflight
#[options("/<_path..>")]
async fn options(_path: PathBuf) -> Result<(), std::io::Error> {
    Ok(())
}

/// Rocket figment for the API server settings.
///
/// JSON bodies are limited to 2 MiB, which bounds the size of an upload.
pub fn figment_from_config(config: &VisualizationConfig) -> Figment {
    rocket::Config::figment()
        .merge(("ident", config.name.clone()))
        .merge(("limits", Limits::new().limit("json", 2.mebibytes())))
        .merge(("address", config.address.clone()))
        .merge(("port", config.port))
        .merge(("log_level", LogLevel::Normal))
}

/// Build the API server around the shared monitor state.
pub fn build_rocket(
    figment: Figment,
    state: MonitorState,
    ingestion: IngestionHandle,
) -> Rocket<Build> {
    rocket::custom(figment)
        .attach(CORS)
        .mount("/", routes![options])
        .mount(
            "/api",
            routes![
                api::upload,
                api::latest_batch,
                api::latest_rms,
                api::get_fft,
                api::get_phase_angle,
            ],
        )
        .register("/", catchers![api::default_catcher])
        .manage(state)
        .manage(ingestion)
}
