//! Synchronization between the host-owned string value and the document.
//!
//! The host owns a serialized HTML string; the kernel owns the tree. The
//! bridge is the only crossing point, and it is an explicit two-field state
//! machine: `last_emitted` (the last string the kernel sent out) and
//! `last_loaded` (the last string the host sent in). Everything the classic
//! controlled-editor bugs hinge on - echo loops, cursor resets on one's own
//! edits - reduces to the two equality checks here.

use lectern_dom::{deserialize, serialize};
use tracing::trace;

use crate::engine::Engine;

/// Reconciles the external value with the internal document.
#[derive(Debug, Default)]
pub struct ValueBridge {
    last_emitted: Option<String>,
    last_loaded: Option<String>,
}

impl ValueBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host → kernel. Called whenever the host-supplied value changes.
    ///
    /// If the incoming value equals the document's current serialization
    /// this is a no-op - the host echoing our own emit back must not rebuild
    /// the tree or reset the selection. Otherwise the document is rebuilt
    /// and the selection moves to the document start.
    ///
    /// Returns whether the document was rebuilt.
    pub fn load(&mut self, engine: &mut Engine, incoming: &str) -> bool {
        let current = serialize(engine.doc(), engine.schema());
        if incoming == current {
            trace!("load matches current serialization, skipping rebuild");
            self.last_loaded = Some(incoming.to_string());
            return false;
        }

        trace!(len = incoming.len(), "loading external value");
        let doc = deserialize(incoming, engine.schema());
        engine.replace_document(doc);
        self.last_loaded = Some(incoming.to_string());
        true
    }

    /// Kernel → host. Called after every document mutation.
    ///
    /// Serializes the document and invokes the change callback only when
    /// the result differs from the last emitted string. No batching: the
    /// emitted value always reflects the document immediately after the
    /// mutation that triggered it.
    ///
    /// Returns whether the callback ran.
    pub fn emit(&mut self, engine: &Engine, on_change: &mut dyn FnMut(&str)) -> bool {
        let html = serialize(engine.doc(), engine.schema());
        if self.last_emitted.as_deref() == Some(html.as_str()) {
            trace!("serialization unchanged since last emit, skipping");
            return false;
        }

        trace!(len = html.len(), "emitting value to host");
        on_change(&html);
        self.last_emitted = Some(html);
        true
    }

    /// The last string emitted to the host, if any.
    pub fn last_emitted(&self) -> Option<&str> {
        self.last_emitted.as_deref()
    }

    /// The last string loaded from the host, if any.
    pub fn last_loaded(&self) -> Option<&str> {
        self.last_loaded.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Command;
    use crate::types::Selection;
    use lectern_dom::Schema;

    fn engine_with(html: &str) -> Engine {
        let schema = Schema::default();
        let doc = lectern_dom::deserialize(html, &schema);
        Engine::with_document(schema, doc)
    }

    #[test]
    fn test_no_echo_load_is_a_noop() {
        let mut engine = engine_with("<p>hello</p>");
        let mut bridge = ValueBridge::new();
        engine.set_selection(Selection::collapsed(3));

        let current = serialize(engine.doc(), engine.schema());
        let doc_before = engine.doc().clone();

        assert!(!bridge.load(&mut engine, &current));
        // Zero document mutations, and the selection survived.
        assert_eq!(engine.doc(), &doc_before);
        assert_eq!(engine.selection(), Selection::collapsed(3));
    }

    #[test]
    fn test_load_of_new_value_rebuilds_and_resets_selection() {
        let mut engine = engine_with("<p>old</p>");
        let mut bridge = ValueBridge::new();
        engine.set_selection(Selection::collapsed(3));

        assert!(bridge.load(&mut engine, "<p>brand new</p>"));
        assert_eq!(engine.doc().text_content(), "brand new");
        assert_eq!(engine.selection(), Selection::collapsed(0));
    }

    #[test]
    fn test_emit_dedups_against_last_emitted() {
        let engine = engine_with("<p>hello</p>");
        let mut bridge = ValueBridge::new();
        let mut calls = 0;

        assert!(bridge.emit(&engine, &mut |_| calls += 1));
        assert!(!bridge.emit(&engine, &mut |_| calls += 1));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_single_keystroke_single_emit() {
        let mut engine = engine_with("<p>hello</p>");
        let mut bridge = ValueBridge::new();

        // Prime the bridge with the current value, as a mounted editor is.
        let mut emitted: Vec<String> = Vec::new();
        bridge.emit(&engine, &mut |html| emitted.push(html.to_string()));
        emitted.clear();

        engine.set_selection(Selection::collapsed(5));
        assert!(engine.apply(&Command::InsertText { text: "!".into() }));
        bridge.emit(&engine, &mut |html| emitted.push(html.to_string()));

        assert_eq!(emitted, vec!["<p>hello!</p>\n".to_string()]);

        // The host echoes the value back: no load-side rebuild happens.
        let echo = emitted[0].clone();
        assert!(!bridge.load(&mut engine, &echo));
        assert_eq!(engine.selection(), Selection::collapsed(6));
    }

    #[test]
    fn test_uncontrolled_host_degrades_gracefully() {
        // A host that never feeds emitted values back: the kernel's
        // document stays authoritative and keeps accepting edits.
        let mut engine = engine_with("<p>a</p>");
        let mut bridge = ValueBridge::new();
        let mut count = 0;

        for text in ["b", "c", "d"] {
            let map = engine.token_map();
            engine.set_selection(Selection::collapsed(map.total()));
            engine.apply(&Command::InsertText { text: text.into() });
            assert!(bridge.emit(&engine, &mut |_| count += 1));
        }

        assert_eq!(count, 3);
        assert_eq!(engine.doc().text_content(), "abcd");
    }
}
