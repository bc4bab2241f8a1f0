//! View State Manager
//!
//! Turns the state of a control scope into a token and back:
//!
//! 1. traverse the scope in depth-first pre-order and let every control with
//!    state enabled append its record to one shared writer
//! 2. compress with the first configured codec that actually shrinks the
//!    payload, otherwise store it raw
//! 3. hash the stored payload and frame it behind the token header
//! 4. base64-encode, enforcing the configured ceiling before doing the work
//!
//! Decoding runs the same steps backwards and yields a [`DecodedState`] that
//! [`ViewStateManager::restore_into`] replays into a freshly built tree.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, trace};

use crate::config::ViewStateConfig;
use crate::control::{ControlId, ControlState, ControlTree};
use crate::errors::{FormatError, ViewStateError};
use crate::viewstate::compression::CompressionKind;
use crate::viewstate::integrity::StateHasher;
use crate::viewstate::pool::{BufferPool, PooledBuffer};
use crate::viewstate::reader::ViewStateReader;
use crate::viewstate::serializer::SerializerRegistry;
use crate::viewstate::token::{TokenHeader, HEADER_LENGTH, PAYLOAD_OFFSET};
use crate::viewstate::writer::ViewStateWriter;
use crate::{Result, WebFormsError};

/// Initial capacity for the raw payload buffer
const INITIAL_PAYLOAD_CAPACITY: usize = 512;

// ----------------------------------------------------------------------------
// Decoded State
// ----------------------------------------------------------------------------

/// A verified, decompressed payload ready to be replayed
#[derive(Debug)]
pub struct DecodedState {
    buffer: PooledBuffer,
    offset: usize,
    control_count: u16,
    compression: CompressionKind,
    raw_length: u16,
}

impl DecodedState {
    /// Uncompressed record bytes
    pub fn payload(&self) -> &[u8] {
        &self.buffer[self.offset..]
    }

    /// Number of controls that contributed a record
    pub fn control_count(&self) -> u16 {
        self.control_count
    }

    /// Codec the token was stored with
    pub fn compression(&self) -> CompressionKind {
        self.compression
    }

    pub fn raw_length(&self) -> u16 {
        self.raw_length
    }
}

// ----------------------------------------------------------------------------
// Manager
// ----------------------------------------------------------------------------

/// Encodes and decodes view state tokens; shared by all requests
#[derive(Debug)]
pub struct ViewStateManager {
    config: ViewStateConfig,
    hasher: StateHasher,
    registry: Arc<SerializerRegistry>,
    buffers: Arc<BufferPool>,
}

impl ViewStateManager {
    /// Validate `config` and build a manager with the built-in serializers
    pub fn new(config: ViewStateConfig) -> Result<Self> {
        config.validate()?;
        let hasher = StateHasher::new(config.hash_key.as_deref())?;
        Ok(Self {
            config,
            hasher,
            registry: Arc::new(SerializerRegistry::with_defaults()),
            buffers: BufferPool::shared(),
        })
    }

    /// Use a custom serializer registry
    pub fn with_registry(mut self, registry: Arc<SerializerRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Rent buffers from `buffers` instead of the process-wide pool
    pub fn with_buffer_pool(mut self, buffers: Arc<BufferPool>) -> Self {
        self.buffers = buffers;
        self
    }

    pub fn config(&self) -> &ViewStateConfig {
        &self.config
    }

    pub fn registry(&self) -> &SerializerRegistry {
        &self.registry
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.buffers
    }

    // ---- Traversal ----

    /// Controls of the scope below `root` in write and restore order
    ///
    /// Forms other than `root` are skipped with their subtree; they carry
    /// their own token.
    fn scope(&self, tree: &ControlTree, root: ControlId) -> Vec<ControlId> {
        let mut order = Vec::new();
        let mut stack: Vec<ControlId> = tree.children(root).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if tree.is_form(id) {
                continue;
            }
            order.push(id);
            stack.extend(tree.children(id).iter().rev().copied());
        }
        order
    }

    // ---- Encoding ----

    /// Write the state of the scope below `root` into a token
    pub fn serialize(&self, tree: &ControlTree, root: ControlId) -> Result<String> {
        let mut writer = ViewStateWriter::new(
            self.buffers.rent(INITIAL_PAYLOAD_CAPACITY),
            &self.registry,
        );

        let mut control_count = 0usize;
        for id in self.scope(tree, root) {
            if !tree.enable_view_state(id) {
                continue;
            }
            if let Some(state) = tree.control(id)?.view_state() {
                state.save_view_state(&mut writer)?;
            }
            control_count += 1;
        }

        let raw_length = u16::try_from(writer.len()).map_err(|_| WebFormsError::PayloadTooLarge {
            what: "view state payload",
            size: writer.len(),
            max: u16::MAX as usize,
        })?;
        let control_count =
            u16::try_from(control_count).map_err(|_| WebFormsError::PayloadTooLarge {
                what: "view state control count",
                size: control_count,
                max: u16::MAX as usize,
            })?;

        let raw = writer.into_buffer();
        let mut output = self.buffers.rent(PAYLOAD_OFFSET + raw.len());
        let compression = self.compress_into(&raw, &mut output);
        drop(raw);

        let header = TokenHeader {
            compression: compression.as_u8(),
            raw_length,
            control_count,
        };
        header.write_to(&mut output[..HEADER_LENGTH]);
        let hash = self.hasher.compute(&output[PAYLOAD_OFFSET..]);
        output[HEADER_LENGTH..PAYLOAD_OFFSET].copy_from_slice(&hash);

        let encoded_length = base64::encoded_len(output.len(), true).unwrap_or(usize::MAX);
        if encoded_length > self.config.max_bytes {
            return Err(ViewStateError::TooLarge {
                size: encoded_length,
                max: self.config.max_bytes,
            }
            .into());
        }

        debug!(
            controls = control_count,
            raw = raw_length,
            stored = output.len() - PAYLOAD_OFFSET,
            encoded = encoded_length,
            compression = ?compression,
            "serialized view state"
        );
        Ok(STANDARD.encode(&output[..]))
    }

    /// Append header space and the smallest payload encoding to `output`
    fn compress_into(&self, raw: &[u8], output: &mut PooledBuffer) -> CompressionKind {
        output.clear();
        output.resize(PAYLOAD_OFFSET, 0);

        for &kind in &self.config.compression {
            if kind == CompressionKind::Raw {
                continue;
            }
            match kind.compress_into(raw, output, self.config.zstd_level) {
                Ok(()) if output.len() - PAYLOAD_OFFSET < raw.len() => return kind,
                Ok(()) => trace!(?kind, "compression did not shrink the payload"),
                Err(error) => debug!(?kind, %error, "compression failed"),
            }
            output.truncate(PAYLOAD_OFFSET);
        }

        output.extend_from_slice(raw);
        CompressionKind::Raw
    }

    // ---- Decoding ----

    /// Validate and unpack a token
    pub fn deserialize(&self, token: &str) -> core::result::Result<DecodedState, ViewStateError> {
        if token.len() > self.config.max_bytes {
            return Err(ViewStateError::TooLarge {
                size: token.len(),
                max: self.config.max_bytes,
            });
        }
        let minimum = ViewStateConfig::minimum_token_bytes();
        if token.len() < minimum {
            return Err(ViewStateError::TooShort {
                actual: token.len(),
                minimum,
            });
        }

        let mut decoded = self.buffers.rent(token.len());
        STANDARD
            .decode_vec(token.as_bytes(), &mut decoded)
            .map_err(|_| ViewStateError::InvalidBase64)?;
        if decoded.len() < PAYLOAD_OFFSET {
            return Err(ViewStateError::TooShort {
                actual: decoded.len(),
                minimum: PAYLOAD_OFFSET,
            });
        }

        let header = TokenHeader::parse(&decoded)?;
        if !self
            .hasher
            .verify(&decoded[PAYLOAD_OFFSET..], &decoded[HEADER_LENGTH..PAYLOAD_OFFSET])
        {
            return Err(ViewStateError::HashMismatch);
        }
        let compression = CompressionKind::from_u8(header.compression).ok_or(
            ViewStateError::UnknownCompression {
                kind: header.compression,
            },
        )?;
        let expected = header.raw_length as usize;

        if compression == CompressionKind::Raw {
            let actual = decoded.len() - PAYLOAD_OFFSET;
            if actual != expected {
                return Err(ViewStateError::LengthMismatch { expected, actual });
            }
            return Ok(DecodedState {
                buffer: decoded,
                offset: PAYLOAD_OFFSET,
                control_count: header.control_count,
                compression,
                raw_length: header.raw_length,
            });
        }

        let mut payload = self.buffers.rent(expected);
        compression
            .decompress_into(&decoded[PAYLOAD_OFFSET..], &mut payload, expected)
            .map_err(|error| ViewStateError::Decompression {
                reason: error.to_string(),
            })?;
        if payload.len() != expected {
            return Err(ViewStateError::LengthMismatch {
                expected,
                actual: payload.len(),
            });
        }
        drop(decoded);

        Ok(DecodedState {
            buffer: payload,
            offset: 0,
            control_count: header.control_count,
            compression,
            raw_length: header.raw_length,
        })
    }

    /// Parse only the header of a verified token
    pub fn inspect(&self, token: &str) -> core::result::Result<TokenHeader, ViewStateError> {
        let decoded = self.deserialize(token)?;
        Ok(TokenHeader {
            compression: decoded.compression.as_u8(),
            raw_length: decoded.raw_length,
            control_count: decoded.control_count,
        })
    }

    // ---- Restore ----

    /// Replay `decoded` into the scope below `root`, returning the number of
    /// controls that consumed a record
    ///
    /// Controls implementing `PostBackLoadHandler` get to run right after
    /// their own record, before their children are scheduled, so children
    /// they recreate are restored in the same pass.
    pub fn restore_into(
        &self,
        tree: &mut ControlTree,
        root: ControlId,
        decoded: &DecodedState,
    ) -> Result<usize> {
        tree.set_restoring(true);
        let result = self.replay(tree, root, decoded);
        tree.set_restoring(false);
        result
    }

    fn replay(&self, tree: &mut ControlTree, root: ControlId, decoded: &DecodedState) -> Result<usize> {
        let mut reader = ViewStateReader::new(decoded.payload(), &self.registry);
        let mut restored = 0usize;
        let mut stack: Vec<ControlId> = tree.children(root).iter().rev().copied().collect();

        while let Some(id) = stack.pop() {
            if !tree.contains(id) || tree.is_form(id) {
                continue;
            }

            if tree.enable_view_state(id) {
                tree.advance(id, ControlState::Initialized)?;
                tree.with_behavior(id, |control, tree| {
                    if let Some(state) = control.view_state_mut() {
                        state.load_view_state(&mut reader)?;
                    }
                    if let Some(handler) = control.post_back_load_handler() {
                        handler.after_post_back_load(tree, id)?;
                    }
                    Ok(())
                })?;
                restored += 1;

                if tree.state(id)? == ControlState::Initialized {
                    tree.transition(id, ControlState::StateRestored)?;
                }
            }

            stack.extend(tree.children(id).iter().rev().copied());
        }

        let expected = decoded.control_count() as usize;
        if restored != expected {
            return Err(WebFormsError::ControlCountMismatch {
                expected,
                actual: restored,
            });
        }
        if reader.remaining() > 0 {
            return Err(FormatError::TrailingBytes {
                count: reader.remaining(),
            }
            .into());
        }

        trace!(controls = restored, "restored view state");
        Ok(restored)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::Control;
    use crate::view_state;
    use crate::viewstate::token::HASH_LENGTH;

    #[derive(Default)]
    struct Root;
    impl Control for Root {}

    #[derive(Default)]
    struct Field {
        text: String,
        count: i32,
    }

    view_state! {
        Field {
            text: String = String::new(),
            count: i32 = 0,
        }
    }

    impl Control for Field {
        fn view_state(&self) -> Option<&dyn crate::viewstate::HasViewState> {
            Some(self)
        }

        fn view_state_mut(&mut self) -> Option<&mut dyn crate::viewstate::HasViewState> {
            Some(self)
        }
    }

    fn manager(config: ViewStateConfig) -> ViewStateManager {
        ViewStateManager::new(config)
            .unwrap()
            .with_buffer_pool(Arc::new(BufferPool::new()))
    }

    fn tree_with(values: &[(&str, i32)]) -> (ControlTree, Vec<ControlId>) {
        let mut tree = ControlTree::new(Root);
        let root = tree.root();
        let ids = values
            .iter()
            .map(|(text, count)| {
                tree.append(
                    root,
                    Field {
                        text: text.to_string(),
                        count: *count,
                    },
                )
                .unwrap()
            })
            .collect();
        tree.advance_subtree(root, ControlState::Initialized).unwrap();
        (tree, ids)
    }

    #[test]
    fn test_roundtrip_into_fresh_tree() {
        let manager = manager(ViewStateConfig::testing());
        let (source, _) = tree_with(&[("hello", 3), ("", 0)]);
        let token = manager.serialize(&source, source.root()).unwrap();

        let decoded = manager.deserialize(&token).unwrap();
        assert_eq!(decoded.control_count(), 2);
        assert_eq!(decoded.compression(), CompressionKind::Raw);

        let (mut target, ids) = tree_with(&[("", 0), ("", 0)]);
        let root = target.root();
        assert_eq!(manager.restore_into(&mut target, root, &decoded).unwrap(), 2);

        let first = target.get::<Field>(ids[0]).unwrap();
        assert_eq!(first.text, "hello");
        assert_eq!(first.count, 3);
        assert_eq!(target.state(ids[0]).unwrap(), ControlState::StateRestored);
        assert!(!target.is_restoring());
    }

    #[test]
    fn test_empty_fields_cost_markers_only() {
        let manager = manager(ViewStateConfig::testing());
        let (tree, _) = tree_with(&[("", 0)]);
        let token = manager.serialize(&tree, tree.root()).unwrap();
        let decoded = manager.deserialize(&token).unwrap();
        assert_eq!(decoded.payload(), &[0, 0]);
    }

    #[test]
    fn test_compressible_payload_is_compressed() {
        let manager = manager(ViewStateConfig::default());
        let long = "repeat ".repeat(200);
        let (tree, _) = tree_with(&[(long.as_str(), 1)]);
        let token = manager.serialize(&tree, tree.root()).unwrap();
        let decoded = manager.deserialize(&token).unwrap();
        assert_ne!(decoded.compression(), CompressionKind::Raw);
        assert_eq!(decoded.raw_length() as usize, decoded.payload().len());
    }

    #[test]
    fn test_disabled_controls_are_not_counted() {
        let manager = manager(ViewStateConfig::testing());
        let (mut tree, ids) = tree_with(&[("a", 1), ("b", 2)]);
        tree.set_enable_view_state(ids[0], false).unwrap();
        let token = manager.serialize(&tree, tree.root()).unwrap();
        assert_eq!(manager.deserialize(&token).unwrap().control_count(), 1);
    }

    fn forge_raw_token(payload: &[u8], control_count: u16) -> String {
        let hasher = StateHasher::new(None).unwrap();
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        bytes.extend_from_slice(&control_count.to_be_bytes());
        bytes.extend_from_slice(&hasher.compute(payload));
        bytes.extend_from_slice(payload);
        STANDARD.encode(&bytes)
    }

    #[test]
    fn test_count_mismatch_is_hard_failure() {
        let manager = manager(ViewStateConfig::testing());
        let (source, _) = tree_with(&[("", 0)]);
        let token = manager.serialize(&source, source.root()).unwrap();
        let decoded = manager.deserialize(&token).unwrap();

        // A stateless control still counts as a visited control
        let (mut target, _) = tree_with(&[("", 0)]);
        let root = target.root();
        target.append(root, Root).unwrap();

        let result = manager.restore_into(&mut target, root, &decoded);
        assert!(matches!(
            result,
            Err(WebFormsError::ControlCountMismatch {
                expected: 1,
                actual: 2
            })
        ));
        assert!(!target.is_restoring());
    }

    #[test]
    fn test_short_payload_is_format_error() {
        let manager = manager(ViewStateConfig::testing());
        let decoded = manager.deserialize(&forge_raw_token(&[0], 1)).unwrap();

        let (mut target, _) = tree_with(&[("", 0)]);
        let root = target.root();
        let result = manager.restore_into(&mut target, root, &decoded);
        assert!(matches!(
            result,
            Err(WebFormsError::Format(FormatError::UnexpectedEnd { .. }))
        ));
    }

    #[test]
    fn test_trailing_bytes_are_rejected() {
        let manager = manager(ViewStateConfig::testing());
        let decoded = manager.deserialize(&forge_raw_token(&[0, 0, 0xFF], 1)).unwrap();

        let (mut target, _) = tree_with(&[("", 0)]);
        let root = target.root();
        let result = manager.restore_into(&mut target, root, &decoded);
        assert!(matches!(
            result,
            Err(WebFormsError::Format(FormatError::TrailingBytes { count: 1 }))
        ));
    }

    #[test]
    fn test_undersized_token() {
        let manager = manager(ViewStateConfig::testing());
        assert!(matches!(
            manager.deserialize("AAAA"),
            Err(ViewStateError::TooShort { .. })
        ));
    }

    #[test]
    fn test_oversized_token() {
        let manager = manager(ViewStateConfig::testing().with_max_bytes(128));
        let token = "A".repeat(200);
        assert!(matches!(
            manager.deserialize(&token),
            Err(ViewStateError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_invalid_base64() {
        let manager = manager(ViewStateConfig::testing());
        let token = "!".repeat(64);
        assert_eq!(
            manager.deserialize(&token).unwrap_err(),
            ViewStateError::InvalidBase64
        );
    }

    #[test]
    fn test_unknown_compression_after_valid_hash() {
        let manager = manager(ViewStateConfig::testing());
        let hasher = StateHasher::new(None).unwrap();
        let payload = [0u8, 0];
        let mut bytes = vec![9u8, 0, 2, 0, 1];
        bytes.extend_from_slice(&hasher.compute(&payload));
        bytes.extend_from_slice(&payload);
        let token = STANDARD.encode(&bytes);

        assert_eq!(
            manager.deserialize(&token).unwrap_err(),
            ViewStateError::UnknownCompression { kind: 9 }
        );
    }

    #[test]
    fn test_length_mismatch() {
        let manager = manager(ViewStateConfig::testing());
        let hasher = StateHasher::new(None).unwrap();
        let payload = [0u8, 0];
        let mut bytes = vec![0u8, 0, 5, 0, 1];
        bytes.extend_from_slice(&hasher.compute(&payload));
        bytes.extend_from_slice(&payload);
        let token = STANDARD.encode(&bytes);

        assert_eq!(
            manager.deserialize(&token).unwrap_err(),
            ViewStateError::LengthMismatch {
                expected: 5,
                actual: 2
            }
        );
    }

    #[test]
    fn test_inspect_header() {
        let manager = manager(ViewStateConfig::testing());
        let (tree, _) = tree_with(&[("abc", 0)]);
        let token = manager.serialize(&tree, tree.root()).unwrap();
        let header = manager.inspect(&token).unwrap();
        assert_eq!(header.control_count, 1);
        assert_eq!(header.raw_length, 6);
        assert_eq!(header.compression, 0);
    }

    #[test]
    fn test_hash_length_constant() {
        assert_eq!(PAYLOAD_OFFSET, HEADER_LENGTH + HASH_LENGTH);
    }
}
