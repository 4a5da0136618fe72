//! Persistence and crash recovery of the bridge on the LMDB backend.

use std::sync::Arc;

use tessera_crypto::keypair_from_seed;
use tessera_node::{verify_chain, AppState, BlockHeader, Genesis, NodeConfig, NodeError};
use tessera_store_lmdb::LmdbEnvironment;
use tessera_transactions::{encode_transaction, Transaction};
use tessera_types::Timestamp;

fn config(dir: &tempfile::TempDir) -> NodeConfig {
    NodeConfig {
        data_dir: dir.path().join("ledger"),
        map_size_mb: 32,
        ..NodeConfig::default()
    }
}

fn mint(seed: u8) -> Transaction {
    let owner = keypair_from_seed(&[seed; 32]);
    Transaction::create(&[owner.public], vec![(vec![owner.public], 10)], None, None)
        .sign(&[&owner])
        .unwrap()
}

#[test]
fn committed_state_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let tx = mint(1);

    let (height, app_hash) = {
        let state = AppState::open(config(&dir)).unwrap();
        let mut bridge = state.bridge().unwrap();
        bridge.init_chain(&Genesis::new("persist")).unwrap();
        bridge
            .begin_block(BlockHeader {
                height: 1,
                time: Timestamp::new(100),
            })
            .unwrap();
        assert!(bridge.deliver_tx(encode_transaction(&tx).as_bytes()).accepted);
        bridge.commit().unwrap();
        (bridge.info().last_height, bridge.info().last_app_hash)
    };

    let state = AppState::open(config(&dir)).unwrap();
    let mut bridge = state.bridge().unwrap();
    assert!(bridge.is_initialized());
    assert_eq!(bridge.info().last_height, height);
    assert_eq!(bridge.info().last_app_hash, app_hash);
    assert!(bridge.ledger().utxos().contains(&tx.output_ref(0)));

    // Same genesis is accepted again, a different one is not.
    bridge.init_chain(&Genesis::new("persist")).unwrap();
    assert!(matches!(
        bridge.init_chain(&Genesis::new("other")),
        Err(NodeError::GenesisMismatch { .. })
    ));

    let report = verify_chain(bridge.ledger(), state.rules.as_ref()).unwrap();
    assert_eq!(report.height, 1);
    assert_eq!(report.app_hash, app_hash);
}

#[test]
fn uncommitted_block_leaves_no_trace_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    {
        let state = AppState::open(config(&dir)).unwrap();
        let mut bridge = state.bridge().unwrap();
        bridge.init_chain(&Genesis::new("crash")).unwrap();
        assert!(bridge.deliver_tx(encode_transaction(&mint(2)).as_bytes()).accepted);
        // Process dies before commit.
    }

    let store = Arc::new(LmdbEnvironment::open(&dir.path().join("ledger"), 32 * 1024 * 1024).unwrap());
    let state = AppState::new(config(&dir), store).unwrap();
    let bridge = state.bridge().unwrap();
    assert_eq!(bridge.info().last_height, 0);
    assert!(bridge.ledger().utxos().is_empty());
}

#[test]
fn replayed_height_is_not_applied_twice() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::open(config(&dir)).unwrap();
    let mut bridge = state.bridge().unwrap();
    bridge.init_chain(&Genesis::new("replay")).unwrap();

    let tx = mint(3);
    let header = BlockHeader {
        height: 1,
        time: Timestamp::new(5),
    };
    bridge.begin_block(header).unwrap();
    bridge.deliver_tx(encode_transaction(&tx).as_bytes());
    let app_hash = bridge.commit().unwrap();

    bridge.begin_block(header).unwrap();
    assert!(bridge.deliver_tx(encode_transaction(&tx).as_bytes()).accepted);
    assert_eq!(bridge.commit().unwrap(), app_hash);
    assert_eq!(bridge.ledger().summary().unwrap().blocks, 1);
    assert_eq!(bridge.ledger().utxos().len(), 1);
}
