//! Promotional dialog flag commands.

use simple_valley_core::cart::{KeyValueStore, SiteFlags, StoreError};

/// Report whether the promotional dialog would be shown.
#[must_use]
pub fn status<P: KeyValueStore, S: KeyValueStore>(flags: &SiteFlags<P, S>) -> String {
    if flags.should_show_promo() {
        "Promotional dialog: not yet shown".to_string()
    } else {
        "Promotional dialog: already shown".to_string()
    }
}

/// Record the promotional dialog as shown.
///
/// # Errors
///
/// Returns an error if the flag cannot be stored.
pub fn dismiss<P: KeyValueStore, S: KeyValueStore>(
    flags: &mut SiteFlags<P, S>,
) -> Result<String, StoreError> {
    flags.mark_promo_dialog_shown()?;
    Ok(status(flags))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use simple_valley_core::cart::MemoryStore;

    use super::*;

    #[test]
    fn test_dismiss_is_sticky() {
        let mut flags = SiteFlags::new(MemoryStore::new(), MemoryStore::new());
        assert_eq!(status(&flags), "Promotional dialog: not yet shown");

        assert_eq!(
            dismiss(&mut flags).unwrap(),
            "Promotional dialog: already shown"
        );

        let (persistent, _) = flags.into_inner();
        let flags = SiteFlags::new(persistent, MemoryStore::new());
        assert_eq!(status(&flags), "Promotional dialog: already shown");
    }
}
