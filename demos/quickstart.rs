use std::sync::Arc;

use serde_json::json;
use websession::{
    create_session_store, CookieDirective, ManualScheduler, SessionBackendConfig, SessionConfig,
    SessionManager, SessionResult, SessionSecret,
};

fn describe(directive: Option<CookieDirective>) -> String {
    match directive {
        Some(CookieDirective::Set(cookie)) => {
            format!("Set-Cookie {}={} (expires {})", cookie.name, cookie.value, cookie.expires)
        }
        Some(CookieDirective::Clear(cookie)) => format!("Delete-Cookie {}", cookie.name),
        None => "no cookie change".to_string(),
    }
}

fn run_inmemory_demo() -> SessionResult<()> {
    println!("== In-memory session demo ==");
    let store = create_session_store(SessionBackendConfig::InMemory)?;
    let scheduler = ManualScheduler::new();
    let manager = SessionManager::builder(Arc::clone(&store), SessionSecret::generate())
        .config(SessionConfig::default().with_expiration_delta_minutes(30))
        .build(&scheduler)?;

    // First request: no cookie yet.
    let session = manager.open(None)?;
    session.lock().insert("user", json!("alice"));
    let directive = manager.save(&session)?;
    println!("First response: {}", describe(directive));
    let Some(id) = session.id() else {
        return Ok(());
    };

    // Second request carries the cookie and changes nothing.
    let session = manager.open(Some(id.as_str()))?;
    println!("Loaded user {:?}", session.lock().get("user"));
    println!("Second response: {}", describe(manager.save(&session)?));

    // Logout empties the session.
    session.lock().data_mut().clear();
    println!("Logout response: {}", describe(manager.save(&session)?));

    for task in scheduler.tasks() {
        println!("Registered task '{}' every {:?}", task.name, task.period);
    }
    let report = manager.reaper().sweep();
    println!("Reaper swept {} record(s)", report.scanned);
    Ok(())
}

fn main() -> SessionResult<()> {
    run_inmemory_demo()
}
