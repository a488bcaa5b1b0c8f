use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_test::assert_ok;

use crowdsense::{routes, seed, AppContext, Config};

// ---

/// Serve the real router on an ephemeral port with the seed catalogue and
/// no background timers.
async fn spawn_app() -> Result<(String, AppContext)> {
    // ---
    let config = Config {
        simulation_enabled: false,
        rng_seed: Some(11),
        manual_refresh_delay: Duration::from_millis(20),
        ..Config::default()
    };
    let ctx = AppContext::new(config, seed::seed_locations(Utc::now()), None);
    let app = routes::router(ctx.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok((format!("http://{}", addr), ctx))
}

fn new_location_body(capacity: u32) -> Value {
    // ---
    json!({
        "name": "Lulu Mall",
        "city": "Kochi",
        "state": "Kerala",
        "category": "mall",
        "capacity": capacity,
        "current_count": 100,
        "latitude": 10.0271,
        "longitude": 76.3084,
        "average_service_rate": 50.0
    })
}

#[tokio::test]
async fn health_reports_ok() -> Result<()> {
    // ---
    let (base, _ctx) = spawn_app().await?;
    let body: Value = Client::new()
        .get(format!("{}/health", base))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(body["status"], "ok");
    assert_eq!(body["locations"], 26);
    assert!(body.get("feed_error").is_none());
    Ok(())
}

#[tokio::test]
async fn filtering_works() -> Result<()> {
    // ---
    let (base, _ctx) = spawn_app().await?;
    let client = Client::new();
    let url = format!("{}/locations", base);

    let all: Vec<Value> = client.get(&url).send().await?.json().await?;
    assert_eq!(all.len(), 26);
    assert_eq!(all[0]["id"], "loc-1");

    let mumbai: Vec<Value> = client
        .get(&url)
        .query(&[("city", "Mumbai")])
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(mumbai.len(), 3);
    assert!(mumbai.iter().all(|l| l["city"] == "Mumbai"));

    let phoenix: Vec<Value> = client
        .get(&url)
        .query(&[("q", "PHOENIX")])
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(phoenix.len(), 3);

    let both: Vec<Value> = client
        .get(&url)
        .query(&[("city", "Mumbai"), ("q", "phoenix")])
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(both.len(), 1);

    // Clearing the filter returns the full set in insertion order.
    let cleared: Vec<Value> = client
        .get(&url)
        .query(&[("city", ""), ("q", "")])
        .send()
        .await?
        .json()
        .await?;
    let ids = |list: &[Value]| list.iter().map(|l| l["id"].clone()).collect::<Vec<_>>();
    assert_eq!(ids(&cleared), ids(&all));
    Ok(())
}

#[tokio::test]
async fn location_lifecycle() -> Result<()> {
    // ---
    let (base, _ctx) = spawn_app().await?;
    let client = Client::new();

    let resp = client
        .post(format!("{}/locations", base))
        .json(&new_location_body(1000))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = resp.json().await?;
    let id = assert_ok!(created["id"].as_str().ok_or("missing id")).to_string();
    assert_eq!(created["utilization"], 10);
    assert_eq!(created["status"], "low");

    // Counts are clamped into [0, capacity].
    let updated: Value = client
        .put(format!("{}/locations/{}/count", base, id))
        .json(&json!({ "count": 1500 }))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(updated["current_count"], 1000);
    assert_eq!(updated["status"], "critical");

    let floored: Value = client
        .put(format!("{}/locations/{}/count", base, id))
        .json(&json!({ "count": -20 }))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(floored["current_count"], 0);

    let logs: Vec<Value> = client
        .get(format!("{}/locations/{}/logs", base, id))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[1]["count"], 0);

    let patched: Value = client
        .patch(format!("{}/locations/{}", base, id))
        .json(&json!({ "name": "Lulu International", "capacity": 2000 }))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(patched["name"], "Lulu International");
    assert_eq!(patched["capacity"], 2000);
    assert_eq!(patched["city"], "Kochi");

    let cities: Vec<String> = client
        .get(format!("{}/cities", base))
        .send()
        .await?
        .json()
        .await?;
    assert!(cities.contains(&"Kochi".to_string()));
    assert!(cities.windows(2).all(|w| w[0] < w[1]));

    let resp = client.delete(format!("{}/locations/{}", base, id)).send().await?;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = client.get(format!("{}/locations/{}", base, id)).send().await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn unknown_ids_and_bad_input_are_rejected() -> Result<()> {
    // ---
    let (base, _ctx) = spawn_app().await?;
    let client = Client::new();

    let resp = client
        .put(format!("{}/locations/loc-missing/count", base))
        .json(&json!({ "count": 5 }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = client.delete(format!("{}/locations/loc-missing", base)).send().await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = client
        .get(format!("{}/locations/loc-missing/logs", base))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = client
        .post(format!("{}/locations", base))
        .json(&new_location_body(0))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .patch(format!("{}/locations/loc-1", base))
        .json(&json!({ "capacity": 0 }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn seeded_location_gets_synthetic_history() -> Result<()> {
    // ---
    let (base, _ctx) = spawn_app().await?;
    let logs: Vec<Value> = Client::new()
        .get(format!("{}/locations/loc-3/logs", base))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(logs.len(), 25);
    assert!(logs.iter().all(|l| l["location_id"] == "loc-3"));
    assert!(logs.iter().all(|l| l["count"].as_u64().unwrap_or(u64::MAX) <= 10000));
    Ok(())
}

#[tokio::test]
async fn insights_are_capped_and_refreshable() -> Result<()> {
    // ---
    let (base, _ctx) = spawn_app().await?;
    let client = Client::new();

    let board: Value = client
        .get(format!("{}/insights", base))
        .send()
        .await?
        .json()
        .await?;
    let insights = board["insights"].as_array().cloned().unwrap_or_default();
    assert!(!insights.is_empty());
    assert!(insights.len() <= 5);
    assert_eq!(board["version"], 1);

    let refreshed: Value = client
        .post(format!("{}/insights/refresh", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(refreshed["version"], 2);
    let ids = refreshed["insights"].as_array().cloned().unwrap_or_default();
    assert!(ids
        .iter()
        .all(|i| i["id"].as_str().is_some_and(|id| id.ends_with("-2"))));
    Ok(())
}

#[tokio::test]
async fn stats_and_map_endpoints() -> Result<()> {
    // ---
    let (base, ctx) = spawn_app().await?;
    let client = Client::new();

    let stats: Value = client.get(format!("{}/stats", base)).send().await?.json().await?;
    assert_eq!(stats["total_locations"], 26);
    assert_eq!(stats["cities"].as_array().map(Vec::len), Some(9));

    let heat: Value = client.get(format!("{}/map/heat", base)).send().await?.json().await?;
    let points = heat["points"].as_array().map(Vec::len).unwrap_or_default();
    assert!(points >= 26 * 19);
    assert!(points <= 26 * 31);

    let all: Value = client
        .get(format!("{}/map/trails?all=true", base))
        .send()
        .await?
        .json()
        .await?;
    let visible: Value = client
        .get(format!("{}/map/trails", base))
        .send()
        .await?
        .json()
        .await?;

    let all_count = all["trails"].as_array().map(Vec::len).unwrap_or_default();
    let visible_count = visible["trails"].as_array().map(Vec::len).unwrap_or_default();
    assert!(all_count > 0);
    assert!(visible_count <= 5);
    assert_eq!(visible["phase"], ctx.trail_phase());
    Ok(())
}

#[tokio::test]
async fn logs_honour_hours_window() -> Result<()> {
    // ---
    let (base, _ctx) = spawn_app().await?;
    let client = Client::new();
    let url = format!("{}/locations/loc-4/logs", base);

    // Synthetic history is hourly, so the last 6 hours hold 7 samples.
    let recent: Vec<Value> = client
        .get(&url)
        .query(&[("hours", "6")])
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(recent.len(), 7);

    let all: Vec<Value> = client.get(&url).send().await?.json().await?;
    assert_eq!(all.len(), 25);

    let resp = client.get(&url).query(&[("hours", "0")]).send().await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn patched_count_is_logged() -> Result<()> {
    // ---
    let (base, _ctx) = spawn_app().await?;
    let client = Client::new();

    let created: Value = client
        .post(format!("{}/locations", base))
        .json(&new_location_body(1000))
        .send()
        .await?
        .json()
        .await?;
    let id = assert_ok!(created["id"].as_str().ok_or("missing id")).to_string();

    client
        .put(format!("{}/locations/{}/count", base, id))
        .json(&json!({ "count": 20 }))
        .send()
        .await?;
    client
        .patch(format!("{}/locations/{}", base, id))
        .json(&json!({ "current_count": 55 }))
        .send()
        .await?;

    let logs: Vec<Value> = client
        .get(format!("{}/locations/{}/logs", base, id))
        .query(&[("hours", "1")])
        .send()
        .await?
        .json()
        .await?;
    let counts: Vec<u64> = logs.iter().filter_map(|l| l["count"].as_u64()).collect();
    assert_eq!(counts, [20, 55]);
    Ok(())
}
