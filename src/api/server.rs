//! Query server — reads requests from stdin, writes envelopes to stdout.
//!
//! One JSON request per line, one JSON envelope per line. Tracing output
//! goes to stderr so it never interferes with the protocol stream. Every
//! request grabs the current snapshot handle, so a swap mid-stream affects
//! only subsequent requests.

use std::io::{self, BufRead, Write};

use tracing::{debug, error, info, warn};

use super::endpoints;
use super::types::{ApiRequest, ApiResponse};
use crate::config::Config;
use crate::error::Error;
use crate::service::GraphService;

/// Run the request loop until stdin closes.
pub fn run(service: &GraphService, config: &Config) {
    info!("query server starting");

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut stdout = stdout.lock();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                error!(error = %e, "failed to read stdin");
                break;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        debug!(request = %trimmed, "received request");

        let request: ApiRequest = match serde_json::from_str(trimmed) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "malformed request");
                let response = ApiResponse::fail(
                    "unknown",
                    &Error::InvalidParameter(format!("malformed request: {}", e)),
                );
                write_response(&mut stdout, &response);
                continue;
            }
        };

        let snapshot = service.snapshot();
        let response = endpoints::dispatch(&snapshot, config, &request.endpoint, &request.params);
        write_response(&mut stdout, &response);
    }

    info!("query server shutting down");
}

/// Write one envelope to stdout (newline-delimited).
fn write_response(stdout: &mut impl Write, response: &ApiResponse) {
    let json = serde_json::to_string(response).unwrap_or_default();
    debug!(response = %json, "sending response");
    let _ = writeln!(stdout, "{}", json);
    let _ = stdout.flush();
}
