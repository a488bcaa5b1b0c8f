//! Advisory generation from a snapshot of all locations.
//!
//! Rules are evaluated in a fixed order and each one independently decides
//! whether to emit an insight. The assembled list is truncated to
//! [`MAX_INSIGHTS`] without re-sorting, so evaluation order decides which
//! insights survive. Randomness only selects wording.

use chrono::{DateTime, Utc};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::models::{Location, LocationCategory};
use crate::status::CrowdStatus;

// ---

pub const MAX_INSIGHTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Route,
    Prediction,
    Alert,
    Tip,
    Normalization,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    // ---
    pub id: String,
    #[serde(rename = "type")]
    pub kind: InsightKind,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub zones: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Inputs to one generation pass besides the snapshot and random source.
#[derive(Debug, Clone, Copy)]
pub struct InsightClock {
    /// Local hour of day, 0-23.
    pub hour: u32,
    /// Generation counter, embedded in insight ids.
    pub version: u64,
    pub now: DateTime<Utc>,
}

/// Aggregates shared by the rules.
struct CrowdAnalysis<'a> {
    /// High or critical, busiest first (ties keep store order).
    congested: Vec<(&'a Location, u32)>,
    /// Low, in store order.
    quiet: Vec<(&'a Location, u32)>,
    /// Cities with mean utilization above 70, in first-seen order.
    hot_cities: Vec<&'a str>,
    /// Cities with mean utilization below 40, in first-seen order.
    cool_cities: Vec<&'a str>,
    /// Mean utilization of transport hubs; 0 when there are none.
    transport_utilization: f64,
}

impl<'a> CrowdAnalysis<'a> {
    fn new(locations: &'a [Location]) -> Self {
        // ---
        let mut congested = Vec::new();
        let mut quiet = Vec::new();
        let mut cities: Vec<(&str, u64, u32)> = Vec::new();
        let (mut transport_total, mut transport_count) = (0u64, 0u32);

        for loc in locations {
            let util = loc.utilization();
            let status = loc.status();
            if status.is_congested() {
                congested.push((loc, util));
            } else if status == CrowdStatus::Low {
                quiet.push((loc, util));
            }

            match cities.iter_mut().find(|(city, _, _)| *city == loc.city) {
                Some(entry) => {
                    entry.1 += u64::from(util);
                    entry.2 += 1;
                }
                None => cities.push((loc.city.as_str(), u64::from(util), 1)),
            }

            if loc.category == LocationCategory::Transport {
                transport_total += u64::from(util);
                transport_count += 1;
            }
        }

        // Stable sort keeps store order among equally busy locations.
        congested.sort_by(|a, b| b.1.cmp(&a.1));

        let mean = |total: u64, count: u32| total as f64 / f64::from(count);
        let hot_cities = cities
            .iter()
            .filter(|(_, total, count)| mean(*total, *count) > 70.0)
            .map(|(city, _, _)| *city)
            .collect();
        let cool_cities = cities
            .iter()
            .filter(|(_, total, count)| mean(*total, *count) < 40.0)
            .map(|(city, _, _)| *city)
            .collect();

        let transport_utilization = if transport_count == 0 {
            0.0
        } else {
            mean(transport_total, transport_count)
        };

        Self {
            congested,
            quiet,
            hot_cities,
            cool_cities,
            transport_utilization,
        }
    }
}

fn pick<R: Rng + ?Sized>(rng: &mut R, variants: usize) -> usize {
    rng.gen_range(0..variants)
}

/// Produce at most [`MAX_INSIGHTS`] insights for the given snapshot.
pub fn generate_insights<R: Rng + ?Sized>(
    locations: &[Location],
    clock: &InsightClock,
    rng: &mut R,
) -> Vec<Insight> {
    // ---
    let analysis = CrowdAnalysis::new(locations);
    let InsightClock { hour, version, now } = *clock;
    let mut insights = Vec::new();

    let make = |id: &str, kind, title: &str, description: String, priority| Insight {
        id: format!("{id}-{version}"),
        kind,
        title: title.to_string(),
        description,
        priority,
        zones: Vec::new(),
        action: None,
        timestamp: now,
    };

    let congested = &analysis.congested;
    let busiest = congested.first().copied();

    // 1. Multi-zone congestion
    if congested.len() >= 3 {
        let count = congested.len();
        let names = congested
            .iter()
            .take(3)
            .map(|(l, _)| l.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let description = match pick(rng, 3) {
            0 => format!(
                "Critical congestion detected across {count} zones: {names}. Consider delaying travel to these areas."
            ),
            1 => format!(
                "{count} locations experiencing high crowd density: {names}. Alternative routes recommended."
            ),
            _ => format!(
                "Alert: {names} showing dangerous congestion levels. Emergency protocols may be activated."
            ),
        };
        insights.push(Insight {
            zones: congested.iter().map(|(l, _)| l.city.clone()).collect(),
            ..make(
                "alert-congestion",
                InsightKind::Alert,
                "Multi-Zone Congestion Alert",
                description,
                Priority::High,
            )
        });
    }

    // 2. Regional congestion
    if analysis.hot_cities.len() >= 2 {
        let cities = analysis.hot_cities.join(", ");
        let description = match pick(rng, 2) {
            0 => format!("Heavy crowd density detected in {cities}. City-wide delays possible."),
            _ => format!("{cities} are running above 70% average capacity. Expect city-wide delays."),
        };
        insights.push(Insight {
            zones: analysis.hot_cities.iter().map(|c| c.to_string()).collect(),
            ..make(
                "alert-cities",
                InsightKind::Alert,
                "Regional Congestion Warning",
                description,
                Priority::High,
            )
        });
    }

    // 3. Peak-hour prediction
    match hour {
        17..=19 => {
            let hours = 20 - hour;
            let description = match pick(rng, 3) {
                0 => {
                    let extra = 20 + rng.gen_range(0..15);
                    format!(
                        "Peak hours in effect. Expect {extra}% higher density for the next {hours} hour(s)."
                    )
                }
                1 => format!(
                    "Currently experiencing rush hour conditions. Crowd levels elevated for approximately {hours} more hour(s)."
                ),
                _ => format!(
                    "High-traffic period active. Plan for {hours}+ hours of increased congestion at transport hubs."
                ),
            };
            insights.push(make(
                "prediction-peak",
                InsightKind::Prediction,
                "Peak Hours Active",
                description,
                Priority::Medium,
            ));
        }
        9..=10 => {
            let extra = 15 + rng.gen_range(0..10);
            let description = match pick(rng, 2) {
                0 => format!(
                    "Morning commute peak in progress. Office areas and transport hubs experiencing {extra}% higher traffic."
                ),
                _ => format!(
                    "Morning rush under way. Expect roughly {extra}% more people at offices and stations."
                ),
            };
            insights.push(make(
                "prediction-morning",
                InsightKind::Prediction,
                "Morning Rush Active",
                description,
                Priority::Medium,
            ));
        }
        14..=16 => {
            let hours = 17 - hour;
            let description = match pick(rng, 3) {
                0 => format!(
                    "Peak hours begin in {hours} hour(s). Plan visits to busy locations before the rush."
                ),
                1 => format!(
                    "Congestion warning: {hours} hour(s) until peak traffic. Consider early departures."
                ),
                _ => format!(
                    "Traffic surge expected in {hours} hour(s). Current window is optimal for travel."
                ),
            };
            insights.push(make(
                "prediction-approaching",
                InsightKind::Prediction,
                "Peak Hours Approaching",
                description,
                Priority::Low,
            ));
        }
        _ => {}
    }

    // 4. Safer route
    if let (Some((crowded, _)), Some(&(first_quiet, first_util))) = (busiest, analysis.quiet.first())
    {
        let (alternative, alt_util) = analysis
            .quiet
            .iter()
            .find(|(l, _)| l.city == crowded.city && l.category == crowded.category)
            .copied()
            .unwrap_or((first_quiet, first_util));
        let (crowded, alt) = (&crowded.name, &alternative.name);

        let description = match pick(rng, 3) {
            0 => format!("{crowded} is congested. {alt} is at {alt_util}% capacity, a much safer option."),
            1 => format!("Avoid {crowded}. Recommend {alt} instead, currently {alt_util}% utilized."),
            _ => format!(
                "Route optimization: Bypass {crowded}. {alt} shows {alt_util}% capacity, the optimal choice."
            ),
        };
        insights.push(Insight {
            action: Some("View Route".to_string()),
            ..make(
                "route-safer",
                InsightKind::Route,
                "Safer Alternative Found",
                description,
                Priority::High,
            )
        });
    }

    // 5. Normalization
    if !analysis.cool_cities.is_empty() && congested.len() < 2 {
        let zones = analysis
            .cool_cities
            .iter()
            .take(2)
            .copied()
            .collect::<Vec<_>>()
            .join(" and ");
        let description = match pick(rng, 3) {
            0 => format!("Crowd levels normalizing in {zones}. Conditions improving."),
            1 => format!("Density decreasing at {zones}. Safe to resume normal activities."),
            _ => format!("{zones} returning to normal capacity. Traffic flowing smoothly."),
        };
        insights.push(Insight {
            zones: analysis.cool_cities.iter().map(|c| c.to_string()).collect(),
            ..make(
                "normal",
                InsightKind::Normalization,
                "Conditions Improving",
                description,
                Priority::Low,
            )
        });
    }

    // 6. Transport advisory
    if analysis.transport_utilization > 60.0 {
        let util = analysis.transport_utilization.round() as u32;
        let description = match pick(rng, 3) {
            0 => format!(
                "Transport hubs averaging {util}% capacity. Metro or alternative transport recommended."
            ),
            1 => format!("Railway stations at {util}% average density. Consider off-peak travel times."),
            _ => format!(
                "High traffic at transport nodes ({util}% avg). Plan extra travel time or use alternatives."
            ),
        };
        let priority = if analysis.transport_utilization > 80.0 {
            Priority::High
        } else {
            Priority::Medium
        };
        insights.push(make(
            "tip-transport",
            InsightKind::Tip,
            "Transport Advisory",
            description,
            priority,
        ));
    }

    // 7. Optimal travel window
    if congested.len() < 2 && (11..=14).contains(&hour) {
        let description = match pick(rng, 2) {
            0 => "Current conditions are favorable for travel. Most locations operating below 60% capacity."
                .to_string(),
            _ => "Good time to travel. Crowd levels are moderate across most monitored locations."
                .to_string(),
        };
        insights.push(make(
            "tip-optimal",
            InsightKind::Tip,
            "Optimal Travel Window",
            description,
            Priority::Low,
        ));
    }

    // 8. Live spike
    if let Some((spike, util)) = busiest {
        let name = &spike.name;
        let description = match pick(rng, 2) {
            0 => format!("{name} showing {util}% capacity. Monitoring for further changes."),
            _ => format!("Density spike at {name}: now {util}% of capacity. Watching closely."),
        };
        let priority = if util > 85 {
            Priority::High
        } else {
            Priority::Medium
        };
        insights.push(Insight {
            zones: vec![spike.city.clone()],
            ..make("realtime", InsightKind::Alert, "Live Density Spike", description, priority)
        });
    }

    insights.truncate(MAX_INSIGHTS);
    insights
}

/// Latest generation pass plus the random source feeding it.
pub struct InsightBoard {
    // ---
    rng: ChaCha8Rng,
    version: u64,
    generated_at: DateTime<Utc>,
    insights: Vec<Insight>,
}

impl InsightBoard {
    // ---
    pub fn new(rng: ChaCha8Rng) -> Self {
        Self {
            rng,
            version: 0,
            generated_at: Utc::now(),
            insights: Vec::new(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn insights(&self) -> &[Insight] {
        &self.insights
    }

    /// Discard the previous pass and regenerate from `locations`.
    pub fn regenerate(
        &mut self,
        locations: &[Location],
        hour: u32,
        now: DateTime<Utc>,
    ) -> &[Insight] {
        // ---
        self.version += 1;
        let clock = InsightClock {
            hour,
            version: self.version,
            now,
        };
        self.insights = generate_insights(locations, &clock, &mut self.rng);
        self.generated_at = now;

        tracing::debug!(
            "Generated {} insights (version {})",
            self.insights.len(),
            self.version
        );
        &self.insights
    }
}
