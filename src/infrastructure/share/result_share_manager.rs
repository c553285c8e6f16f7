//! Leader/follower bookkeeping for shared downloads and decodes.
//!
//! A leader performs the real work for a key; followers attach to it and are
//! told when it finishes. Notifications always happen after the map lock has
//! been released, so a follower may attach or register again from inside its
//! callback.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::domain::entities::{CancelCause, ErrorCause};
use crate::domain::errors::ShareError;

/// How a leader ended its share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareOutcome {
    /// The leader produced its result and stored it in the shared cache.
    Completed,
    /// The leader failed.
    Failed(ErrorCause),
    /// The leader was canceled.
    Canceled(CancelCause),
}

/// A request that can lead or follow a share.
pub trait ShareParticipant: Send + Sync {
    /// Unique request id.
    fn share_id(&self) -> u64;

    /// Disk cache key, or `None` if download sharing is not allowed.
    fn download_share_key(&self) -> Option<&str>;

    /// Memory cache key, or `None` if display sharing is not allowed.
    fn display_share_key(&self) -> Option<&str>;

    /// Progress forwarded from the download leader.
    fn on_share_progress(&self, total: Option<u64>, completed: u64);

    /// The download leader finished.
    fn on_download_share_finished(self: Arc<Self>, outcome: ShareOutcome);

    /// The display leader finished.
    fn on_display_share_finished(self: Arc<Self>, outcome: ShareOutcome);
}

struct Share<P> {
    leader_id: u64,
    followers: Vec<Arc<P>>,
}

#[derive(Clone, Copy)]
enum Kind {
    Download,
    Display,
}

impl Kind {
    const fn name(self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::Display => "display",
        }
    }

    fn key<P: ShareParticipant>(self, participant: &P) -> Option<&str> {
        match self {
            Self::Download => participant.download_share_key(),
            Self::Display => participant.display_share_key(),
        }
    }
}

/// Two independent share maps: downloads keyed by disk cache key and displays
/// keyed by memory cache key.
pub struct ResultShareManager<P> {
    downloads: Mutex<HashMap<String, Share<P>>>,
    displays: Mutex<HashMap<String, Share<P>>>,
}

impl<P: ShareParticipant> ResultShareManager<P> {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            downloads: Mutex::new(HashMap::new()),
            displays: Mutex::new(HashMap::new()),
        }
    }

    const fn map(&self, kind: Kind) -> &Mutex<HashMap<String, Share<P>>> {
        match kind {
            Kind::Download => &self.downloads,
            Kind::Display => &self.displays,
        }
    }

    /// Registers `leader` as the unique download provider for its key.
    ///
    /// # Errors
    /// Returns [`ShareError::LeaderExists`] if a leader is already registered,
    /// which indicates a scheduling bug.
    pub fn register_download_provider(&self, leader: &P) -> Result<(), ShareError> {
        self.register(Kind::Download, leader)
    }

    /// Attaches `follower` to the download leader for its key, if any.
    pub fn request_attach_download(&self, follower: &Arc<P>) -> bool {
        self.attach(Kind::Download, follower)
    }

    /// Ends the download share and notifies followers in attach order.
    pub fn unregister_download_provider(&self, leader: &P, outcome: ShareOutcome) {
        self.unregister(Kind::Download, leader, outcome);
    }

    /// Forwards a progress tick from the download leader to its followers.
    pub fn update_download_progress(&self, leader: &P, total: Option<u64>, completed: u64) {
        let Some(key) = leader.download_share_key() else {
            return;
        };
        let followers: Vec<Arc<P>> = {
            let downloads = self.downloads.lock();
            match downloads.get(key) {
                Some(share) if share.leader_id == leader.share_id() => {
                    share.followers.clone()
                }
                _ => return,
            }
        };
        for follower in followers {
            follower.on_share_progress(total, completed);
        }
    }

    /// Registers `leader` as the unique display provider for its key.
    ///
    /// # Errors
    /// Returns [`ShareError::LeaderExists`] if a leader is already registered.
    pub fn register_display_provider(&self, leader: &P) -> Result<(), ShareError> {
        self.register(Kind::Display, leader)
    }

    /// Attaches `follower` to the display leader for its key, if any.
    pub fn request_attach_display(&self, follower: &Arc<P>) -> bool {
        self.attach(Kind::Display, follower)
    }

    /// Ends the display share and notifies followers in attach order.
    pub fn unregister_display_provider(&self, leader: &P, outcome: ShareOutcome) {
        self.unregister(Kind::Display, leader, outcome);
    }

    /// Number of active download shares.
    #[must_use]
    pub fn download_share_count(&self) -> usize {
        self.downloads.lock().len()
    }

    /// Number of active display shares.
    #[must_use]
    pub fn display_share_count(&self) -> usize {
        self.displays.lock().len()
    }

    fn register(&self, kind: Kind, leader: &P) -> Result<(), ShareError> {
        let Some(key) = kind.key(leader) else {
            return Err(ShareError::NotEligible {
                request_id: leader.share_id(),
            });
        };
        let mut map = self.map(kind).lock();
        if map.contains_key(key) {
            return Err(ShareError::LeaderExists {
                key: key.to_string(),
            });
        }
        map.insert(
            key.to_string(),
            Share {
                leader_id: leader.share_id(),
                followers: Vec::new(),
            },
        );
        trace!(share = kind.name(), key = %key, id = leader.share_id(), "Registered share leader");
        Ok(())
    }

    fn attach(&self, kind: Kind, follower: &Arc<P>) -> bool {
        let Some(key) = kind.key(follower.as_ref()) else {
            return false;
        };
        let mut map = self.map(kind).lock();
        let Some(share) = map.get_mut(key) else {
            return false;
        };
        if share.leader_id == follower.share_id() {
            return false;
        }
        share.followers.push(Arc::clone(follower));
        debug!(
            share = kind.name(),
            key = %key,
            leader = share.leader_id,
            follower = follower.share_id(),
            "Attached share follower"
        );
        true
    }

    fn unregister(&self, kind: Kind, leader: &P, outcome: ShareOutcome) {
        let Some(key) = kind.key(leader) else {
            return;
        };
        let share = {
            let mut map = self.map(kind).lock();
            let is_leader = map
                .get(key)
                .map(|share| share.leader_id == leader.share_id());
            match is_leader {
                Some(true) => map.remove(key),
                Some(false) => {
                    warn!(share = kind.name(), key = %key, "Unregister from a non-leader ignored");
                    None
                }
                None => None,
            }
        };
        let Some(share) = share else {
            return;
        };

        debug!(
            share = kind.name(),
            key = %key,
            followers = share.followers.len(),
            ?outcome,
            "Releasing share"
        );
        for follower in share.followers {
            match kind {
                Kind::Download => follower.on_download_share_finished(outcome),
                Kind::Display => follower.on_display_share_finished(outcome),
            }
        }
    }
}

impl<P: ShareParticipant> Default for ResultShareManager<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> std::fmt::Debug for ResultShareManager<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultShareManager")
            .field("downloads", &self.downloads.lock().len())
            .field("displays", &self.displays.lock().len())
            .finish()
    }
}
