//! One-shot UI flags kept next to the cart.
//!
//! The promotional dialog is shown at most once per browser (persistent
//! storage); the floating call-to-action stays hidden for the rest of a
//! session once dismissed (session storage).

use tracing::warn;

use super::store::{KeyValueStore, StoreError, keys};

const SET: &str = "true";

/// Flags over a persistent store `P` and a session store `S`.
#[derive(Debug)]
pub struct SiteFlags<P, S> {
    persistent: P,
    session: S,
}

impl<P: KeyValueStore, S: KeyValueStore> SiteFlags<P, S> {
    pub const fn new(persistent: P, session: S) -> Self {
        Self {
            persistent,
            session,
        }
    }

    /// Whether the promotional dialog has already been shown.
    ///
    /// An unreadable store counts as not shown.
    pub fn promo_dialog_shown(&self) -> bool {
        is_set(&self.persistent, keys::PROMO_DIALOG_SHOWN)
    }

    /// Record that the promotional dialog was shown.
    ///
    /// # Errors
    ///
    /// Returns an error if the persistent store cannot be written.
    pub fn mark_promo_dialog_shown(&mut self) -> Result<(), StoreError> {
        self.persistent.set(keys::PROMO_DIALOG_SHOWN, SET)
    }

    /// Whether the dialog should open on this page load.
    pub fn should_show_promo(&self) -> bool {
        !self.promo_dialog_shown()
    }

    pub fn floating_cta_hidden(&self) -> bool {
        is_set(&self.session, keys::FLOATING_CTA_HIDDEN)
    }

    /// Hide the floating call-to-action for the rest of the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store cannot be written.
    pub fn hide_floating_cta(&mut self) -> Result<(), StoreError> {
        self.session.set(keys::FLOATING_CTA_HIDDEN, SET)
    }

    pub fn should_show_floating_cta(&self) -> bool {
        !self.floating_cta_hidden()
    }

    pub fn into_inner(self) -> (P, S) {
        (self.persistent, self.session)
    }
}

fn is_set(store: &impl KeyValueStore, key: &str) -> bool {
    match store.get(key) {
        Ok(value) => value.as_deref() == Some(SET),
        Err(e) => {
            warn!(key, error = %e, "Flag unreadable");
            false
        }
    }
}
