use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time;
use tracing::{debug, info, warn};

use crate::engine::clock::{self, DayKind};
use crate::engine::config::{ConfigPatch, PolicyConfig};
use crate::engine::enforce::EnforcementSink;
use crate::engine::overrides::OverrideRegistry;
use crate::engine::session::SessionTracker;
use crate::engine::usage::UsageStore;
use crate::storage::StateStore;

/// Sites added to the configured blocked set when the emergency block
/// is activated
pub const EMERGENCY_EXTRA_SITES: &[&str] = &["twitter.com", "instagram.com"];

/// Outcome of a blocking query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Blocked(BlockReason),
}

impl Decision {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Decision::Blocked(_))
    }
}

/// Why a site is blocked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    Emergency,
    WeekdaySchedule,
    WeekendSchedule,
    BudgetExhausted,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            BlockReason::Emergency => "emergency block active",
            BlockReason::WeekdaySchedule => "weekday schedule",
            BlockReason::WeekendSchedule => "weekend schedule",
            BlockReason::BudgetExhausted => "weekly time budget exceeded",
        };
        f.write_str(text)
    }
}

/// Administrator-triggered blocking of an expanded site set
#[derive(Debug, Clone, Default)]
pub struct EmergencyState {
    pub active: bool,
    pub sites: std::collections::BTreeSet<String>,
}

/// The site access policy engine
///
/// Owns the configuration and emergency state, and orchestrates the
/// clock, usage store, override registry and session tracker into a
/// single blocking decision. Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct PolicyEngine {
    inner: Arc<Inner>,
}

struct Inner {
    config: RwLock<PolicyConfig>,
    usage: Mutex<UsageStore>,
    overrides: Mutex<OverrideRegistry>,
    sessions: Mutex<SessionTracker>,
    emergency: RwLock<EmergencyState>,
    store: Arc<dyn StateStore>,
    sink: Arc<dyn EnforcementSink>,
}

impl PolicyEngine {
    /// Create an engine from the backing store, falling back to the
    /// default configuration when none has been saved yet
    pub fn new(store: Arc<dyn StateStore>, sink: Arc<dyn EnforcementSink>) -> Result<Self> {
        let config = store
            .load_config()
            .context("Failed to load configuration")?
            .unwrap_or_default();
        config.validate().context("Stored configuration is invalid")?;

        let usage = UsageStore::open(store.clone())?;

        Ok(Self {
            inner: Arc::new(Inner {
                config: RwLock::new(config),
                usage: Mutex::new(usage),
                overrides: Mutex::new(OverrideRegistry::new()),
                sessions: Mutex::new(SessionTracker::new()),
                emergency: RwLock::new(EmergencyState::default()),
                store,
                sink,
            }),
        })
    }

    /// Current configuration
    pub async fn configuration(&self) -> PolicyConfig {
        self.inner.config.read().await.clone()
    }

    /// Merge, validate, persist and atomically swap the configuration
    ///
    /// Any failure leaves both the stored and the live configuration
    /// unchanged; there is no partial application.
    pub async fn update_configuration(&self, patch: ConfigPatch) -> Result<PolicyConfig> {
        let mut config = self.inner.config.write().await;

        let candidate = config.merged(&patch);
        candidate
            .validate()
            .context("Rejected configuration update")?;

        self.inner
            .store
            .save_config(&candidate)
            .context("Failed to persist configuration")?;

        *config = candidate.clone();
        info!("Configuration updated");
        Ok(candidate)
    }

    /// Decide whether a site is blocked, first matching rule wins
    pub async fn decide(&self, site: &str, now: NaiveDateTime) -> Decision {
        // 1. An active override suspends everything, globally
        if self.inner.overrides.lock().await.is_active(now) {
            return Decision::Allowed;
        }

        let config = self.inner.config.read().await.clone();

        // 2. Emergency decides both ways while it is set
        {
            let emergency = self.inner.emergency.read().await;
            if emergency.active {
                return if emergency.sites.contains(site) {
                    Decision::Blocked(BlockReason::Emergency)
                } else {
                    Decision::Allowed
                };
            }
        }

        // 3./4. Schedule; outside the window, fall through to the budget
        match clock::day_kind(now) {
            DayKind::Weekday => {
                let schedule = &config.weekday_schedule;
                if schedule.enabled {
                    let time = clock::time_of_day(now);
                    if schedule.start.as_str() <= time.as_str()
                        && time.as_str() <= schedule.end.as_str()
                    {
                        return if config.blocked_sites.contains(site) {
                            Decision::Blocked(BlockReason::WeekdaySchedule)
                        } else {
                            Decision::Allowed
                        };
                    }
                }
            }
            DayKind::Weekend => {
                if config.weekend_schedule.enabled {
                    return if config.blocked_sites.contains(site) {
                        Decision::Blocked(BlockReason::WeekendSchedule)
                    } else {
                        Decision::Allowed
                    };
                }
            }
        }

        // 5. Weekly budget, answered from the in-memory usage table
        if let Some(&budget) = config.site_budgets.get(site) {
            let used = self
                .inner
                .usage
                .lock()
                .await
                .get(site, clock::week_id(now));
            if used >= budget {
                return Decision::Blocked(BlockReason::BudgetExhausted);
            }
        }

        Decision::Allowed
    }

    /// Decide, and on a budget block push an enforce signal so an
    /// already-open page gets interrupted
    ///
    /// The push is fire-and-forget; the answer never waits on delivery.
    pub async fn query_decision(&self, site: &str, now: NaiveDateTime) -> Decision {
        let decision = self.decide(site, now).await;

        if decision == Decision::Blocked(BlockReason::BudgetExhausted) {
            self.inner.sink.enforce(site, BlockReason::BudgetExhausted);
        }

        decision
    }

    /// Boolean form of [`query_decision`](Self::query_decision)
    pub async fn is_blocked(&self, site: &str, now: NaiveDateTime) -> bool {
        self.query_decision(site, now).await.is_blocked()
    }

    /// Open a session for a site and schedule its max-session guard
    ///
    /// A duplicate start while a session is open is a no-op.
    pub async fn start_session(&self, site: &str, now: NaiveDateTime) {
        let max_minutes = self.inner.config.read().await.max_session_minutes;

        let mut sessions = self.inner.sessions.lock().await;
        if !sessions.begin(site, now) {
            debug!("Duplicate start for {} ignored", site);
            return;
        }

        info!("Started session for {} at {}", site, now);

        let engine = self.clone();
        let guard_site = site.to_string();
        let handle = tokio::spawn(async move {
            time::sleep(Duration::from_secs(u64::from(max_minutes) * 60)).await;

            info!("Max session length reached for {}, forcing stop", guard_site);
            if let Err(e) = engine.stop_session(&guard_site, clock::now()).await {
                warn!("Forced stop for {} could not persist usage: {:#}", guard_site, e);
            }
        });

        sessions.attach_guard(site, handle.abort_handle());
    }

    /// Close a site's session and commit its elapsed minutes
    ///
    /// A stop without an open session is a no-op, which makes the
    /// explicit stop and the guard firing race-free. The session is
    /// removed before the usage write: a persistence failure propagates
    /// but never resurrects the session.
    pub async fn stop_session(&self, site: &str, now: NaiveDateTime) -> Result<()> {
        let closed = self.inner.sessions.lock().await.end(site, now);

        let Some(closed) = closed else {
            debug!("Stop for {} without open session ignored", site);
            return Ok(());
        };

        info!(
            "Ended session for {}: {} minutes this week",
            closed.site, closed.elapsed_minutes
        );

        self.inner
            .usage
            .lock()
            .await
            .add(&closed.site, closed.week, closed.elapsed_minutes)?;

        Ok(())
    }

    /// Submit an educational override code
    ///
    /// Returns true and installs a grant iff the code is configured;
    /// resubmission refreshes the grant's expiry.
    pub async fn submit_override(&self, code: &str, now: NaiveDateTime) -> bool {
        let (lifetime, codes) = {
            let config = self.inner.config.read().await;
            (config.override_minutes, config.educational_codes.clone())
        };

        let granted = self
            .inner
            .overrides
            .lock()
            .await
            .grant(code, now, lifetime, &codes);

        if granted {
            info!("Educational override granted for {} minutes", lifetime);
        } else {
            debug!("Rejected override code");
        }

        granted
    }

    /// Block the expanded emergency site set and revoke all overrides
    pub async fn emergency_block_all(&self) {
        let mut sites = self.inner.config.read().await.blocked_sites.clone();
        sites.extend(EMERGENCY_EXTRA_SITES.iter().map(|s| s.to_string()));

        {
            let mut emergency = self.inner.emergency.write().await;
            emergency.active = true;
            emergency.sites = sites;
        }

        self.inner.overrides.lock().await.clear_all();

        warn!("Emergency block activated");
        self.inner.sink.announce(
            "Emergency block activated",
            "All sites have been blocked immediately.",
        );
    }

    /// Explicit administrative reset of the emergency state
    pub async fn clear_emergency(&self) {
        let mut emergency = self.inner.emergency.write().await;
        if emergency.active {
            info!("Emergency block cleared");
        }
        *emergency = EmergencyState::default();
    }

    pub async fn emergency_state(&self) -> EmergencyState {
        self.inner.emergency.read().await.clone()
    }

    /// Minutes spent this week on every configured blocked site
    pub async fn weekly_stats(&self, now: NaiveDateTime) -> BTreeMap<String, u64> {
        let blocked = self.inner.config.read().await.blocked_sites.clone();
        let week = clock::week_id(now);

        let usage = self.inner.usage.lock().await;
        blocked
            .into_iter()
            .map(|site| {
                let minutes = usage.get(&site, week);
                (site, minutes)
            })
            .collect()
    }

    pub async fn open_sessions(&self) -> Vec<String> {
        self.inner.sessions.lock().await.open_sites()
    }

    /// Re-evaluate every open session and push enforce signals for the
    /// blocked ones
    ///
    /// This sweep, not the initial load check, is what interrupts a page
    /// that exceeds its budget while already open.
    pub async fn sweep(&self, now: NaiveDateTime) {
        let open = self.inner.sessions.lock().await.open_sites();

        for site in open {
            if let Decision::Blocked(reason) = self.decide(&site, now).await {
                debug!("Sweep: {} is blocked ({})", site, reason);
                self.inner.sink.enforce(&site, reason);
            }
        }
    }

    /// Drive the periodic sweep, once per minute
    pub async fn run_sweeper(self) {
        let mut interval = time::interval(Duration::from_secs(60));

        loop {
            interval.tick().await;
            self.sweep(clock::now()).await;
        }
    }
}
