//! Property-based tests for key agreement
//!
//! These tests verify the fundamental invariants:
//!
//! 1. **Agreement**: without noise, both parties end with the same sifted key
//!    and therefore the same symmetric key
//! 2. **Oracle contract**: equal bases reproduce the sent bit
//! 3. **Sifting bounds**: the sifted key never exceeds the number of
//!    agreeing positions or the configured maximum
//! 4. **Channel agreement**: records sealed by one side open on the other

use proptest::prelude::*;
use qlink_core::{
    Basis, BasisSequence, BitSequence, CoinFlipOracle, Environment, InitiatorAction,
    InitiatorHandshake, InitiatorSession, MeasurementOracle, ResponderAction, ResponderHandshake,
    ResponderSession, SessionConfig, env::test_utils::MockEnv, matching_indices, sift,
};

fn basis_strategy() -> impl Strategy<Value = Basis> {
    prop_oneof![Just(Basis::Rectilinear), Just(Basis::Diagonal)]
}

fn bases_strategy(len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(0u8..=1, len..=len)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_sessions_agree_on_key(seed in any::<u64>(), num_bits in 1usize..=512) {
        let env = MockEnv::with_seed(seed);
        let config = SessionConfig { num_bits, ..SessionConfig::default() };

        let mut initiator = InitiatorSession::new(env.clone(), config.clone());
        let mut responder = ResponderSession::new(env, config);

        let (bits, bases) = initiator.generate().unwrap();
        let (_, responder_bases) = responder.measure(&bits, &bases).unwrap();

        let a = initiator.finalize_key(responder_bases).unwrap();
        let b = responder.finalize_key(bases).unwrap();

        // INVARIANT: identical sifted keys on both sides
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(
            initiator.established().unwrap().symmetric_key(),
            responder.established().unwrap().symmetric_key()
        );
        prop_assert!(a.len() <= 256);
    }

    #[test]
    fn prop_matching_bases_reproduce_bit(
        seed in any::<u64>(),
        bit in 0u8..=1,
        basis in basis_strategy(),
    ) {
        let oracle = CoinFlipOracle::new(MockEnv::with_seed(seed));
        prop_assert_eq!(oracle.measure(bit, basis, basis), bit);
    }

    #[test]
    fn prop_sift_is_bounded(
        (own, peer, source) in (1usize..200).prop_flat_map(|n| {
            (bases_strategy(n), bases_strategy(n), bases_strategy(n))
        }),
        max_len in 0usize..300,
    ) {
        let own = BasisSequence::from_raw(&own).unwrap();
        let peer = BasisSequence::from_raw(&peer).unwrap();
        let source = BitSequence::from_raw(&source).unwrap();

        let (key, stats) = sift(&own, &peer, &source, max_len).unwrap();
        let matching = matching_indices(&own, &peer);

        prop_assert_eq!(stats.matching, matching.len());
        prop_assert_eq!(key.len(), matching.len().min(max_len));

        // INVARIANT: kept bits come from agreeing positions, in order
        for (kept, &index) in key.bits().iter().zip(&matching) {
            prop_assert_eq!(*kept, source.as_slice()[index]);
        }
    }

    #[test]
    fn prop_handshake_channels_interoperate(
        seed in any::<u64>(),
        record in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        let env = MockEnv::with_seed(seed);
        let config = SessionConfig { num_bits: 128, ..SessionConfig::default() };
        let mut initiator = InitiatorHandshake::new(env.clone(), config.clone());
        let mut responder = ResponderHandshake::new(env.clone(), config);

        let actions = initiator.start(env.now()).unwrap();
        let InitiatorAction::SendQubits(transfer) = &actions[0];
        let payload = transfer.encode().unwrap();

        let reply = match responder.handle_qubit_payload(&payload).unwrap().as_slice() {
            [ResponderAction::SendBases(reply)] => reply.encode().unwrap(),
            other => panic!("expected SendBases, got {other:?}"),
        };
        let channel = initiator.handle_basis_payload(&reply, env.now()).unwrap();

        let sealed = channel.seal_message(&record).encode().unwrap();
        prop_assert_eq!(
            responder.handle_encrypted_payload(&sealed),
            vec![ResponderAction::Deliver(record)]
        );
    }
}

/// INVARIANT: unequal bases yield each outcome about half of the time.
#[test]
fn mismatched_bases_are_fair_coin() {
    let oracle = CoinFlipOracle::new(MockEnv::with_seed(99));
    let trials = 20_000;

    let ones: usize = (0..trials)
        .map(|_| usize::from(oracle.measure(0, Basis::Rectilinear, Basis::Diagonal)))
        .sum();

    // Well within 5 sigma of trials / 2
    assert!((9_500..=10_500).contains(&ones), "ones = {ones}");
}

/// Roughly half of the positions agree when both sides choose bases at random.
#[test]
fn random_bases_agree_about_half_the_time() {
    let env = MockEnv::with_seed(2024);
    let config = SessionConfig { num_bits: 4096, max_sifted_len: 4096, ..SessionConfig::default() };

    let mut initiator = InitiatorSession::new(env.clone(), config.clone());
    let mut responder = ResponderSession::new(env, config);

    let (bits, bases) = initiator.generate().unwrap();
    let (_, responder_bases) = responder.measure(&bits, &bases).unwrap();
    initiator.finalize_key(responder_bases).unwrap();

    let stats = initiator.established().unwrap().stats();
    assert_eq!(stats.total, 4096);
    assert!((1_850..=2_250).contains(&stats.matching), "matching = {}", stats.matching);
    assert_eq!(stats.kept, stats.matching);
}
