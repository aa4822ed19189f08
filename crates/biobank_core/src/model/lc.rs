//! Records that only exist under an LC trial.

use super::catalog::FACS;
use super::id::generate_id;
use uuid::Uuid;

entity! {
    table FACS, key id: Uuid;
    /// Flow cytometry run; the LC trial link is optional.
    pub struct Facs {
        pub id: Uuid = ShortString(36),
        pub lc_trial_id: Option<Uuid> = ShortString(36),
    }
}

impl Facs {
    pub fn new(lc_trial_id: Option<Uuid>) -> Self {
        Self {
            id: generate_id(),
            lc_trial_id,
        }
    }
}
