//! Authorization: keepers, threshold, and the approver.
//!
//! An account with keepers is controlled by any `threshold` of them. An
//! account without keepers is controlled by the single key its address
//! derives from. Independently, an account may name an approver whose
//! signature is additionally required for every type in its approve list
//! (or every type, when the list is empty).

use std::collections::BTreeSet;

use tracing::debug;

use super::{Account, AccountError, AccountFault};
use crate::config::MAX_KEEPERS;
use crate::crypto::{satisfies_threshold, verified_signers, PublicKey, SignatureEntry};
use crate::transaction::types::TxType;
use crate::types::Address;

impl Account {
    /// Checks that `signers` authorize this account.
    ///
    /// With `plus`, one signature more than the threshold is needed, capped
    /// at the number of keepers. Used by keeper-changing and destroying
    /// operations.
    pub fn verify_signers(
        &self,
        signers: &BTreeSet<PublicKey>,
        plus: bool,
    ) -> Result<(), AccountError> {
        let op = if plus { "verify_plus" } else { "verify" };
        let inner = self.read();
        let keepers = &inner.data.keepers;

        if keepers.is_empty() {
            if signers
                .iter()
                .any(|k| Address::from_public_key(k) == self.address)
            {
                return Ok(());
            }
            return Err(self.err(
                op,
                AccountFault::Unauthorized("no signature from the account key".into()),
            ));
        }

        let threshold = if plus {
            (inner.data.threshold as usize + 1).min(keepers.len()) as u16
        } else {
            inner.data.threshold
        };
        if !satisfies_threshold(threshold, keepers, signers) {
            return Err(self.err(
                op,
                AccountFault::Unauthorized(format!(
                    "insufficient keeper signatures, expected {}",
                    threshold
                )),
            ));
        }
        Ok(())
    }

    pub fn verify(&self, digest: &[u8], signatures: &[SignatureEntry]) -> Result<(), AccountError> {
        self.verify_signers(&verified_signers(digest, signatures), false)
    }

    pub fn verify_plus(
        &self,
        digest: &[u8],
        signatures: &[SignatureEntry],
    ) -> Result<(), AccountError> {
        self.verify_signers(&verified_signers(digest, signatures), true)
    }

    /// Whether a `tx_type` transaction from this account needs the approver.
    pub fn needs_approver(&self, tx_type: TxType) -> bool {
        let inner = self.read();
        inner.data.approver.is_some()
            && (inner.data.approve_list.is_empty() || inner.data.approve_list.contains(&tx_type))
    }

    /// Fails when the approver is required but absent from `signers`.
    pub fn check_approver(
        &self,
        tx_type: TxType,
        signers: &BTreeSet<PublicKey>,
    ) -> Result<(), AccountError> {
        if !self.needs_approver(tx_type) {
            return Ok(());
        }
        match self.read().data.approver {
            Some(approver) if signers.contains(&approver) => Ok(()),
            _ => Err(self.err(
                "check_approver",
                AccountFault::Unauthorized(format!("{} requires approver signature", tx_type)),
            )),
        }
    }

    /// Replaces authorization settings.
    ///
    /// `threshold` and `keepers` go together: both or neither. `approver`
    /// is `Some(None)` to clear it. At least one field must be given.
    pub fn update_keepers(
        &self,
        threshold: Option<u16>,
        keepers: Option<Vec<PublicKey>>,
        approver: Option<Option<PublicKey>>,
        approve_list: Option<Vec<TxType>>,
    ) -> Result<(), AccountError> {
        const OP: &str = "update_keepers";
        let invalid = |msg: String| self.err(OP, AccountFault::InvalidInput(msg));

        let pair = match (threshold, keepers) {
            (Some(t), Some(k)) => {
                check_keepers(t, &k).map_err(invalid)?;
                Some((t, k))
            }
            (None, None) => None,
            _ => {
                return Err(invalid(
                    "threshold and keepers must be updated together".into(),
                ))
            }
        };
        if let Some(list) = &approve_list {
            check_approve_list(list).map_err(invalid)?;
        }
        if pair.is_none() && approver.is_none() && approve_list.is_none() {
            return Err(invalid("nothing to update".into()));
        }

        let mut inner = self.write();
        if let Some((t, k)) = pair {
            inner.data.threshold = t;
            inner.data.keepers = k;
        }
        if let Some(a) = approver {
            inner.data.approver = a;
        }
        if let Some(list) = approve_list {
            inner.data.approve_list = list;
        }
        debug!(
            account = %self.address,
            threshold = inner.data.threshold,
            keepers = inner.data.keepers.len(),
            "keepers updated"
        );
        Ok(())
    }
}

pub(crate) fn check_keepers(threshold: u16, keepers: &[PublicKey]) -> Result<(), String> {
    if keepers.is_empty() || keepers.len() > MAX_KEEPERS {
        return Err(format!(
            "invalid keepers count, expected 1..={}, got {}",
            MAX_KEEPERS,
            keepers.len()
        ));
    }
    let distinct: BTreeSet<&PublicKey> = keepers.iter().collect();
    if distinct.len() != keepers.len() {
        return Err("duplicate keeper".into());
    }
    if threshold == 0 || threshold as usize > keepers.len() {
        return Err(format!(
            "invalid threshold, expected 1..={}, got {}",
            keepers.len(),
            threshold
        ));
    }
    Ok(())
}

pub(crate) fn check_approve_list(list: &[TxType]) -> Result<(), String> {
    let distinct: BTreeSet<&TxType> = list.iter().collect();
    if distinct.len() != list.len() {
        return Err("duplicate type in approve list".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::error::ErrorKind;

    fn keys(n: u8) -> Vec<Keypair> {
        (1..=n).map(|i| Keypair::from_seed(&[i; 32])).collect()
    }

    fn signers(kps: &[&Keypair]) -> BTreeSet<PublicKey> {
        kps.iter().map(|k| k.public_key()).collect()
    }

    #[test]
    fn keyless_account_is_controlled_by_its_own_key() {
        let kp = Keypair::from_seed(&[5; 32]);
        let other = Keypair::from_seed(&[6; 32]);
        let acc = Account::new(kp.address());

        let digest = b"tx digest";
        let sig = SignatureEntry::sign(&kp, digest);
        assert!(acc.verify(digest, &[sig]).is_ok());
        assert!(acc.verify_plus(digest, &[sig]).is_ok());

        let bad = SignatureEntry::sign(&other, digest);
        let err = acc.verify(digest, &[bad]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
    }

    #[test]
    fn threshold_and_plus_rule() {
        let kps = keys(3);
        let acc = Account::new(Address::from_bytes([1; 20]));
        acc.update_keepers(
            Some(2),
            Some(kps.iter().map(|k| k.public_key()).collect()),
            None,
            None,
        )
        .unwrap();

        let two = signers(&[&kps[0], &kps[1]]);
        assert!(acc.verify_signers(&two, false).is_ok());
        assert!(acc.verify_signers(&two, true).is_err());

        let three = signers(&[&kps[0], &kps[1], &kps[2]]);
        assert!(acc.verify_signers(&three, true).is_ok());
    }

    #[test]
    fn plus_is_capped_at_keeper_count() {
        let kps = keys(2);
        let acc = Account::new(Address::from_bytes([1; 20]));
        acc.update_keepers(
            Some(2),
            Some(kps.iter().map(|k| k.public_key()).collect()),
            None,
            None,
        )
        .unwrap();
        assert!(acc
            .verify_signers(&signers(&[&kps[0], &kps[1]]), true)
            .is_ok());
    }

    #[test]
    fn threshold_and_keepers_are_a_pair() {
        let kps = keys(1);
        let acc = Account::new(Address::from_bytes([1; 20]));
        assert!(acc.update_keepers(Some(1), None, None, None).is_err());
        assert!(acc
            .update_keepers(None, Some(vec![kps[0].public_key()]), None, None)
            .is_err());
        assert!(acc.update_keepers(None, None, None, None).is_err());
        assert!(acc
            .update_keepers(Some(2), Some(vec![kps[0].public_key()]), None, None)
            .is_err());
        assert!(acc
            .update_keepers(
                Some(1),
                Some(vec![kps[0].public_key(), kps[0].public_key()]),
                None,
                None
            )
            .is_err());
        assert!(acc.is_empty());
    }

    #[test]
    fn approver_scoped_by_approve_list() {
        let kps = keys(2);
        let acc = Account::new(Address::from_bytes([1; 20]));
        acc.update_keepers(
            Some(1),
            Some(vec![kps[0].public_key()]),
            Some(Some(kps[1].public_key())),
            Some(vec![TxType::WithdrawStake]),
        )
        .unwrap();

        let owner = signers(&[&kps[0]]);
        assert!(acc.check_approver(TxType::Transfer, &owner).is_ok());
        assert!(acc.check_approver(TxType::WithdrawStake, &owner).is_err());
        let both = signers(&[&kps[0], &kps[1]]);
        assert!(acc.check_approver(TxType::WithdrawStake, &both).is_ok());

        // Empty list: every type needs the approver.
        acc.update_keepers(None, None, None, Some(Vec::new())).unwrap();
        assert!(acc.check_approver(TxType::Transfer, &owner).is_err());

        // Clearing the approver lifts the requirement.
        acc.update_keepers(None, None, Some(None), None).unwrap();
        assert!(acc.check_approver(TxType::Transfer, &owner).is_ok());
        assert_eq!(acc.keepers(), vec![kps[0].public_key()]);
    }
}
