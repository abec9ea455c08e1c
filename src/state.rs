//! Process-wide club state: the rotating attendance key, the effective
//! meeting weight, role lookup, and the member profile cache. One
//! instance is created at startup and shared by the router, the
//! conversation flows, and the broadcast engine.

use std::collections::HashMap;
use std::sync::RwLock;

use gavel_core::config::ClubConfig;
use gavel_store::{MemberProfile, Store};
use rand::Rng;
use tracing::{info, warn};

/// Hex chars in a meeting key. Short enough to write on a whiteboard.
const MEETING_KEY_BYTES: usize = 3;

/// Hex bytes in a revoked key. Long enough that nobody ever guesses it.
const REVOKED_KEY_BYTES: usize = 32;

/// Command access tiers, lowest to highest. A higher tier always
/// includes the lower tiers' command set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    Member,
    Admin,
    ServerAdmin,
}

pub struct ClubState {
    club: ClubConfig,
    attendance_key: RwLock<String>,
    effective_count: RwLock<f64>,
    /// user id -> profile, refreshed from the store on connect and on
    /// cache misses during broadcasts.
    profiles: RwLock<HashMap<String, MemberProfile>>,
}

impl ClubState {
    /// The initial key is random and unannounced, so no inbound text
    /// can match it before the first `meeting begin`.
    pub fn new(club: ClubConfig) -> Self {
        Self {
            club,
            attendance_key: RwLock::new(random_hex(REVOKED_KEY_BYTES)),
            effective_count: RwLock::new(1.0),
            profiles: RwLock::new(HashMap::new()),
        }
    }

    pub fn club(&self) -> &ClubConfig {
        &self.club
    }

    /// Resolve a user's command tier from the configured role lists.
    /// The maintainer is implicitly a server admin.
    pub fn role_of(&self, user_id: &str) -> Role {
        if self.club.maintainer == user_id
            || self.club.server_admins.iter().any(|id| id == user_id)
        {
            Role::ServerAdmin
        } else if self.club.admins.iter().any(|id| id == user_id) {
            Role::Admin
        } else {
            Role::Member
        }
    }

    /// Start a meeting: rotate in a short announceable key and, when
    /// given, set the meeting's weight. Returns the new key.
    pub fn begin_meeting(&self, effective: Option<f64>) -> String {
        let key = random_hex(MEETING_KEY_BYTES);
        *self.attendance_key.write().unwrap() = key.clone();
        if let Some(e) = effective {
            *self.effective_count.write().unwrap() = e;
        }
        info!("meeting started, effective count {}", self.current_effective());
        key
    }

    /// End the meeting: revoke the key and reset the weight to 1.
    pub fn end_meeting(&self) {
        *self.attendance_key.write().unwrap() = random_hex(REVOKED_KEY_BYTES);
        *self.effective_count.write().unwrap() = 1.0;
        info!("meeting ended, attendance key revoked");
    }

    pub fn current_effective(&self) -> f64 {
        *self.effective_count.read().unwrap()
    }

    /// Exact-match an inbound text against the active key. Returns the
    /// meeting weight to record when it matches.
    pub fn match_attendance_key(&self, text: &str) -> Option<f64> {
        if *self.attendance_key.read().unwrap() == text {
            Some(self.current_effective())
        } else {
            None
        }
    }

    /// Reload the profile cache from the store.
    pub async fn refresh_profiles(&self, store: &Store) {
        match store.roster().await {
            Ok(roster) => {
                let mut cache = self.profiles.write().unwrap();
                cache.clear();
                for profile in roster {
                    cache.insert(profile.user_id.clone(), profile);
                }
                info!("profile cache refreshed ({} members)", cache.len());
            }
            Err(e) => warn!("profile cache refresh failed: {e}"),
        }
    }

    pub fn cached_profile(&self, user_id: &str) -> Option<MemberProfile> {
        self.profiles.read().unwrap().get(user_id).cloned()
    }

    /// Cache lookup with one lazy refill on miss (people sign up while
    /// the bot is running).
    pub async fn profile_or_refresh(&self, store: &Store, user_id: &str) -> Option<MemberProfile> {
        if let Some(profile) = self.cached_profile(user_id) {
            return Some(profile);
        }
        self.refresh_profiles(store).await;
        self.cached_profile(user_id)
    }
}

fn random_hex(bytes: usize) -> String {
    let mut rng = rand::rng();
    (0..bytes).map(|_| format!("{:02x}", rng.random::<u8>())).collect()
}

/// Render a meeting weight: whole numbers without a decimal point,
/// everything else with one decimal place.
pub fn fmt_effective(effective: f64) -> String {
    if effective.fract() == 0.0 {
        format!("{}", effective as i64)
    } else {
        format!("{effective:.1}")
    }
}
