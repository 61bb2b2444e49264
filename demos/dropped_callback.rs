//! Dropped callback example for callback-inspector.
//!
//! Demonstrates:
//! - Handing one callback to several consumers, one of which never calls it back
//! - Inspecting pending and complete callbacks while the program runs
//! - Configuring the query listener and exit report from the environment
//!
//! Run with: `cargo run --example dropped_callback`
//!
//! Try `CB_INSPECTOR_REPORT=all` to see completed callbacks in the exit report, or
//! `CB_INSPECTOR_PORT=9119` and `curl localhost:9119/pending` while it sleeps.

use callback_inspector::{install_global, wrap, InspectorConfig, ReportMode, Wrapped};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn on_response(status: u16, body: String) {
    println!("   on_response({}, {} bytes)", status, body.len());
}

/// Calls back once the "request" finishes.
fn fetch(url: &str, done: Wrapped<fn(u16, String), (u16, String)>) -> thread::JoinHandle<()> {
    let url = url.to_string();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        done.call(200, format!("<html>{}</html>", url));
    })
}

/// Forgets its callback on the error path.
fn fetch_with_retry(url: &str, done: Wrapped<fn(u16, String), (u16, String)>) {
    if url.starts_with("https://") {
        done.call(200, String::new());
    }
    // retry budget exhausted, callback silently dropped
}

fn main() {
    env_logger::init();

    println!("=== callback-inspector: Dropped Callback ===\n");

    let inspector = install_global();

    // Use the environment if it asks for anything, otherwise arm the report ourselves
    let config = match InspectorConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("ignoring inspector configuration: {}", err);
            InspectorConfig::default()
        }
    };
    let _report = match inspector.apply(&config) {
        Ok(Some(report)) => report,
        Ok(None) => inspector.report_on_exit(false),
        Err(err) => {
            eprintln!("inspector listener unavailable: {}", err);
            inspector.report_on_exit(false)
        }
    };

    // -------------------------------------------------------------------------
    // 1. Hand the same callback to two consumers
    // -------------------------------------------------------------------------
    println!("1. Handing on_response to fetch and fetch_with_retry...");

    let cb: Arc<fn(u16, String)> = Arc::new(on_response);
    let first = match wrap!(inspector, cb, "fetch") {
        Ok(wrapped) => wrapped,
        Err(err) => return eprintln!("{}", err),
    };
    let second = match wrap!(inspector, cb, "fetch_with_retry") {
        Ok(wrapped) => wrapped,
        Err(err) => return eprintln!("{}", err),
    };

    let worker = fetch("http://example.com", first);
    fetch_with_retry("http://example.com", second);
    let _ = worker.join();

    // -------------------------------------------------------------------------
    // 2. Inspect while running
    // -------------------------------------------------------------------------
    println!("\n2. Current state:");

    for record in inspector.all_callbacks() {
        println!(
            "   #{} called {} time(s) across {} hand-off(s)",
            record.index,
            record.total_called,
            record.handlers.len()
        );
        for handler in &record.handlers {
            println!("     {} -> {}", handler.meta, handler.called);
        }
    }

    // -------------------------------------------------------------------------
    // 3. A callback nobody calls
    // -------------------------------------------------------------------------
    println!("\n3. Handing a closure to a consumer that drops it...");

    let _ignored = wrap!(inspector, Arc::new(|_: bool| ()), "subscribe");
    println!("   pending: {}", inspector.pending_callbacks().len());

    if config.serve_port.is_some() {
        println!("\n   query listener running, sleeping 30s");
        thread::sleep(Duration::from_secs(30));
    }

    println!("\n{}", inspector.render(ReportMode::All));
    println!("=== Done, exit report follows on stderr ===");
}
