//! Transaction module split into types and validation for better modularity

pub mod types;
pub mod validation;

pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::error::ChainError;
    use crate::primitives::Address;

    fn create_test_address(s: &str) -> Address {
        let mut address = [0u8; 20];
        let bytes = s.as_bytes();
        address[..bytes.len()].copy_from_slice(bytes);
        address
    }

    fn sample_transfer() -> Transaction {
        Transaction::new(
            1,
            vec![TxInput::unsigned([7u8; 32], 0)],
            vec![TxOutput::new(create_test_address("carol"), 4000, output_type::GENERAL)],
            "payment",
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn test_id_matches_content() {
        let tx = sample_transfer();
        assert_eq!(tx.id, tx.compute_id().unwrap());
        assert!(tx.validate_structure().is_ok());
    }

    #[test]
    fn test_mutation_invalidates_id() {
        let mut tx = sample_transfer();
        tx.memo = "changed".to_string();
        assert!(matches!(tx.validate_id(), Err(ChainError::InvalidTransaction(_))));

        tx.finalize_id().unwrap();
        assert!(tx.validate_id().is_ok());
    }

    #[test]
    fn test_zero_amount_output_rejected() {
        let tx = Transaction::new(
            1,
            vec![TxInput::unsigned([1u8; 32], 0)],
            vec![TxOutput::new(create_test_address("bob"), 0, output_type::GENERAL)],
            "",
            vec![],
        )
        .unwrap();
        assert!(tx.validate_structure().is_err());
    }

    #[test]
    fn test_duplicate_input_rejected() {
        let input = TxInput::unsigned([3u8; 32], 1);
        let tx = Transaction::new(
            1,
            vec![input.clone(), input],
            vec![TxOutput::new(create_test_address("bob"), 5, output_type::GENERAL)],
            "",
            vec![],
        )
        .unwrap();
        let err = tx.validate_structure().unwrap_err();
        assert!(err.to_string().contains("twice"));
    }

    #[test]
    fn test_long_memo_rejected() {
        let tx = Transaction::new(
            1,
            vec![TxInput::unsigned([3u8; 32], 0)],
            vec![TxOutput::new(create_test_address("bob"), 5, output_type::GENERAL)],
            "m".repeat(Transaction::MAX_MEMO_LENGTH + 1),
            vec![],
        )
        .unwrap();
        assert!(tx.validate_structure().is_err());
    }

    #[test]
    fn test_signing_keeps_digest_and_refreshes_id() {
        let keypair = KeyPair::generate();
        let mut tx = sample_transfer();
        let digest_before = tx.signing_digest().unwrap();
        let id_before = tx.id;

        tx.sign(&keypair).unwrap();

        assert_eq!(tx.signing_digest().unwrap(), digest_before);
        assert_ne!(tx.id, id_before);
        assert!(tx.validate_id().is_ok());
        assert!(tx.inputs.iter().all(|i| i.is_signed()));
        assert!(tx.verify_input_signature(0, &keypair.address()).is_ok());
    }

    #[test]
    fn test_signature_from_wrong_owner_rejected() {
        let keypair = KeyPair::generate();
        let mut tx = sample_transfer();
        tx.sign(&keypair).unwrap();

        let err = tx.verify_input_signature(0, &create_test_address("mallory")).unwrap_err();
        assert!(matches!(err, ChainError::CryptoError(_)));
    }

    #[test]
    fn test_unsigned_input_rejected() {
        let tx = sample_transfer();
        let err = tx.verify_input_signature(0, &create_test_address("carol")).unwrap_err();
        assert!(err.to_string().contains("not signed"));
    }

    #[test]
    fn test_output_total() {
        let tx = Transaction::new(
            1,
            vec![],
            vec![
                TxOutput::new(create_test_address("a"), 10_000, output_type::GENERAL),
                TxOutput::new(create_test_address("b"), 3_300_000, output_type::GENERAL),
            ],
            "",
            vec![],
        )
        .unwrap();
        assert_eq!(tx.total_output().unwrap(), 3_310_000);
        assert!(tx.is_issuance());
    }

    #[test]
    fn test_output_total_overflow() {
        let tx = Transaction::new(
            1,
            vec![],
            vec![
                TxOutput::new(create_test_address("a"), u64::MAX, output_type::GENERAL),
                TxOutput::new(create_test_address("b"), 1, output_type::GENERAL),
            ],
            "",
            vec![],
        )
        .unwrap();
        assert!(tx.total_output().is_err());
    }
}
