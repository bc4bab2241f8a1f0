//! View state token tests
//!
//! These tests verify round trips through a real control tree, integrity
//! checking of every payload byte, the size ceiling and that pooled buffers
//! are returned on every exit path.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use proptest::prelude::*;
use webforms_core::viewstate::{BufferPool, CompressionKind, ViewStateManager, HEADER_LENGTH};
use webforms_core::webcontrols::{Label, Panel};
use webforms_core::{ControlId, ControlTree, ViewStateConfig, ViewStateError, WebFormsError};

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

fn labelled_tree(texts: &[String]) -> (ControlTree, Vec<ControlId>) {
    let mut tree = ControlTree::new(Panel::new());
    let root = tree.root();
    let ids = texts
        .iter()
        .map(|text| tree.append(root, Label::new(text.clone())).unwrap())
        .collect();
    (tree, ids)
}

fn blank_tree(count: usize) -> (ControlTree, Vec<ControlId>) {
    labelled_tree(&vec![String::new(); count])
}

fn manager(keyed: bool, config: ViewStateConfig) -> ViewStateManager {
    let config = if keyed {
        config.with_hash_key("test-secret")
    } else {
        config
    };
    ViewStateManager::new(config).unwrap()
}

fn reencode(token: &str, edit: impl FnOnce(&mut Vec<u8>)) -> String {
    let mut bytes = STANDARD.decode(token).unwrap();
    edit(&mut bytes);
    STANDARD.encode(bytes)
}

// ----------------------------------------------------------------------------
// Properties
// ----------------------------------------------------------------------------

proptest! {
    #[test]
    fn prop_label_text_survives_round_trip(
        texts in prop::collection::vec(".{0,40}", 0..8),
        keyed in any::<bool>(),
    ) {
        let manager = manager(keyed, ViewStateConfig::default());
        let (tree, _) = labelled_tree(&texts);
        let token = manager.serialize(&tree, tree.root()).unwrap();

        let (mut fresh, ids) = blank_tree(texts.len());
        let root = fresh.root();
        let decoded = manager.deserialize(&token).unwrap();
        let restored = manager.restore_into(&mut fresh, root, &decoded).unwrap();

        prop_assert_eq!(restored, texts.len());
        for (id, text) in ids.iter().zip(&texts) {
            prop_assert_eq!(fresh.get::<Label>(*id).unwrap().text(), text.as_str());
        }
    }

    #[test]
    fn prop_any_tampered_hash_or_payload_byte_is_rejected(
        text in "[a-z]{1,120}",
        position in any::<prop::sample::Index>(),
        flip in 1u8..=255,
        keyed in any::<bool>(),
    ) {
        let manager = manager(keyed, ViewStateConfig::testing());
        let (tree, _) = labelled_tree(&[text]);
        let token = manager.serialize(&tree, tree.root()).unwrap();

        let tampered = reencode(&token, |bytes| {
            let index = HEADER_LENGTH + position.index(bytes.len() - HEADER_LENGTH);
            bytes[index] ^= flip;
        });

        prop_assert_eq!(manager.deserialize(&tampered).err(), Some(ViewStateError::HashMismatch));
    }
}

// ----------------------------------------------------------------------------
// Header Tampering
// ----------------------------------------------------------------------------

#[test]
fn test_tampered_control_count_fails_restore() {
    let manager = manager(false, ViewStateConfig::testing());
    let (tree, _) = labelled_tree(&["a".to_string(), "b".to_string()]);
    let token = manager.serialize(&tree, tree.root()).unwrap();
    let tampered = reencode(&token, |bytes| bytes[4] += 1);

    let decoded = manager.deserialize(&tampered).unwrap();
    let (mut fresh, _) = blank_tree(2);
    let root = fresh.root();
    let result = manager.restore_into(&mut fresh, root, &decoded);

    assert!(matches!(
        result,
        Err(WebFormsError::ControlCountMismatch {
            expected: 3,
            actual: 2
        })
    ));
}

#[test]
fn test_tampered_length_or_codec_is_rejected() {
    let manager = manager(false, ViewStateConfig::testing());
    let (tree, _) = labelled_tree(&["hello".to_string()]);
    let token = manager.serialize(&tree, tree.root()).unwrap();

    let longer = reencode(&token, |bytes| bytes[2] += 1);
    assert!(matches!(
        manager.deserialize(&longer).err(),
        Some(ViewStateError::LengthMismatch { .. })
    ));

    let unknown = reencode(&token, |bytes| bytes[0] = 9);
    assert_eq!(
        manager.deserialize(&unknown).err(),
        Some(ViewStateError::UnknownCompression { kind: 9 })
    );
}

#[test]
fn test_keyed_token_is_rejected_without_key() {
    let keyed = manager(true, ViewStateConfig::testing());
    let unkeyed = manager(false, ViewStateConfig::testing());
    let (tree, _) = labelled_tree(&["secret".to_string()]);

    let token = keyed.serialize(&tree, tree.root()).unwrap();
    assert!(keyed.deserialize(&token).is_ok());
    assert_eq!(
        unkeyed.deserialize(&token).err(),
        Some(ViewStateError::HashMismatch)
    );
}

// ----------------------------------------------------------------------------
// Compression
// ----------------------------------------------------------------------------

#[test]
fn test_repetitive_state_is_deflated() {
    let manager = manager(
        false,
        ViewStateConfig::default().with_compression(vec![CompressionKind::Deflate]),
    );
    let texts = vec!["abcabcabc".repeat(40); 4];
    let (tree, _) = labelled_tree(&texts);
    let token = manager.serialize(&tree, tree.root()).unwrap();

    let header = manager.inspect(&token).unwrap();
    assert_eq!(header.compression, CompressionKind::Deflate.as_u8());
    assert_eq!(header.control_count, 4);

    let decoded = manager.deserialize(&token).unwrap();
    assert_eq!(decoded.compression(), CompressionKind::Deflate);
    assert_eq!(decoded.payload().len(), header.raw_length as usize);
}

#[test]
fn test_tiny_state_stays_raw() {
    let manager = manager(false, ViewStateConfig::default());
    let (tree, _) = labelled_tree(&["x".to_string()]);
    let token = manager.serialize(&tree, tree.root()).unwrap();
    assert_eq!(
        manager.inspect(&token).unwrap().compression,
        CompressionKind::Raw.as_u8()
    );
}

// ----------------------------------------------------------------------------
// Size Ceiling and Buffer Hygiene
// ----------------------------------------------------------------------------

#[test]
fn test_size_ceiling_applies_to_both_directions() {
    let pool = Arc::new(BufferPool::new());
    let manager = ViewStateManager::new(ViewStateConfig::testing().with_max_bytes(256))
        .unwrap()
        .with_buffer_pool(Arc::clone(&pool));

    let (tree, _) = labelled_tree(&["z".repeat(300)]);
    let result = manager.serialize(&tree, tree.root());
    assert!(matches!(
        result,
        Err(WebFormsError::ViewState(ViewStateError::TooLarge { max: 256, .. }))
    ));
    assert_eq!(pool.outstanding(), 0);

    let oversized = "A".repeat(300);
    assert!(matches!(
        manager.deserialize(&oversized).err(),
        Some(ViewStateError::TooLarge { size: 300, max: 256 })
    ));
    assert_eq!(pool.outstanding(), 0);
}

#[test]
fn test_buffers_are_returned_on_every_failure() {
    let pool = Arc::new(BufferPool::new());
    let manager = ViewStateManager::new(ViewStateConfig::testing())
        .unwrap()
        .with_buffer_pool(Arc::clone(&pool));
    let (tree, _) = labelled_tree(&["a".to_string(), "b".to_string()]);
    let token = manager.serialize(&tree, tree.root()).unwrap();
    assert_eq!(pool.outstanding(), 0);

    assert!(manager.deserialize(&"!".repeat(80)).is_err());
    assert_eq!(pool.outstanding(), 0);

    let tampered = reencode(&token, |bytes| {
        let last = bytes.len() - 1;
        bytes[last] ^= 1;
    });
    assert!(manager.deserialize(&tampered).is_err());
    assert_eq!(pool.outstanding(), 0);

    {
        let decoded = manager.deserialize(&token).unwrap();
        assert_eq!(pool.outstanding(), 1);
        let (mut fresh, _) = blank_tree(1);
        let root = fresh.root();
        assert!(manager.restore_into(&mut fresh, root, &decoded).is_err());
    }
    assert_eq!(pool.outstanding(), 0);
}
