//! The editor facade: the one type a host view talks to.
//!
//! Construction takes the host contract - an initial string value and a
//! change callback - and wires the engine and bridge together. Commands go
//! in through [`Editor::run`], every successful mutation emits through the
//! bridge, and host value changes come in through [`Editor::set_value`].
//! Pending uploads are tracked by key so a completed upload inserts its
//! node through the engine like any other command.

use std::collections::HashMap;

use lectern_dom::{Schema, SmolStr, deserialize};
use tracing::debug;

use crate::bridge::ValueBridge;
use crate::commands::Command;
use crate::engine::{ActiveQuery, Engine};
use crate::types::Selection;

/// What a pending upload turns into once its URL is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Image,
    Media,
}

/// An upload that has been started but not yet committed.
///
/// The preview data URL exists only for the host to show while the upload
/// is in flight; it is discarded on resolution and never enters the
/// document.
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub kind: UploadKind,
    pub preview_data_url: String,
}

/// A mounted editor instance.
pub struct Editor {
    engine: Engine,
    bridge: ValueBridge,
    on_change: Box<dyn FnMut(&str)>,
    on_upload_error: Option<Box<dyn FnMut(&str)>>,
    pending_uploads: HashMap<SmolStr, PendingUpload>,
}

impl Editor {
    /// Create an editor over the host's initial value.
    ///
    /// The change callback is not invoked for the initial load; it fires
    /// only for kernel-originated mutations.
    pub fn new(initial_value: &str, on_change: impl FnMut(&str) + 'static) -> Self {
        Self::with_schema(Schema::default(), initial_value, on_change)
    }

    pub fn with_schema(
        schema: Schema,
        initial_value: &str,
        on_change: impl FnMut(&str) + 'static,
    ) -> Self {
        let doc = deserialize(initial_value, &schema);
        let mut engine = Engine::with_document(schema, doc);
        let mut bridge = ValueBridge::new();
        // Record the initial value as loaded so a later host echo of it is
        // a no-op. The document is already built from it, so at worst this
        // rebuilds to the same tree.
        bridge.load(&mut engine, initial_value);
        Self {
            engine,
            bridge,
            on_change: Box::new(on_change),
            on_upload_error: None,
            pending_uploads: HashMap::new(),
        }
    }

    /// Register the optional upload-error callback.
    pub fn on_upload_error(&mut self, callback: impl FnMut(&str) + 'static) {
        self.on_upload_error = Some(Box::new(callback));
    }

    /// Current serialization of the document.
    pub fn value(&self) -> String {
        lectern_dom::serialize(self.engine.doc(), self.engine.schema())
    }

    /// Host → kernel: the external value changed. Returns whether the
    /// document was rebuilt (an echo of our own emit never rebuilds).
    pub fn set_value(&mut self, value: &str) -> bool {
        self.bridge.load(&mut self.engine, value)
    }

    /// Run a command. On success the new serialization is emitted to the
    /// host's change callback (deduplicated by the bridge).
    pub fn run(&mut self, cmd: &Command) -> bool {
        let applied = self.engine.apply(cmd);
        if applied && cmd.mutates_document() {
            self.bridge.emit(&self.engine, &mut self.on_change);
        }
        applied
    }

    pub fn can_apply(&self, cmd: &Command) -> bool {
        self.engine.can_apply(cmd)
    }

    pub fn is_active(&self, query: &ActiveQuery) -> bool {
        self.engine.is_active(query)
    }

    pub fn selection(&self) -> Selection {
        self.engine.selection()
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.engine.set_selection(selection);
    }

    /// Read access to the engine, for overlay placement and introspection.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    // === Pending uploads ===

    /// Track a started upload. The preview data URL is what the host shows
    /// until the committed URL arrives.
    pub fn begin_upload(
        &mut self,
        key: impl Into<SmolStr>,
        kind: UploadKind,
        preview_data_url: String,
    ) {
        let key = key.into();
        debug!(%key, "tracking pending upload");
        self.pending_uploads
            .insert(key, PendingUpload { kind, preview_data_url });
    }

    /// An upload finished: insert the committed node and drop the preview.
    pub fn resolve_upload(&mut self, key: &str, url: &str) -> bool {
        let Some(pending) = self.pending_uploads.remove(key) else {
            debug!(%key, "resolve for unknown upload key, ignoring");
            return false;
        };
        let cmd = match pending.kind {
            UploadKind::Image => Command::InsertImage { src: url.into(), alt: SmolStr::default() },
            UploadKind::Media => Command::InsertMedia { src: url.into() },
        };
        self.run(&cmd)
    }

    /// An upload failed: drop the preview and surface the error to the
    /// host. Nothing is inserted and the document is untouched.
    pub fn fail_upload(&mut self, key: &str, message: &str) {
        if self.pending_uploads.remove(key).is_some()
            && let Some(callback) = self.on_upload_error.as_mut()
        {
            callback(message);
        }
    }

    /// An upload was cancelled before completion: drop it without a trace.
    pub fn cancel_upload(&mut self, key: &str) -> bool {
        self.pending_uploads.remove(key).is_some()
    }

    pub fn pending_upload(&self, key: &str) -> Option<&PendingUpload> {
        self.pending_uploads.get(key)
    }

    pub fn pending_upload_count(&self) -> usize {
        self.pending_uploads.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn collected() -> (Rc<RefCell<Vec<String>>>, impl FnMut(&str)) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        (log, move |html: &str| sink.borrow_mut().push(html.to_string()))
    }

    #[test]
    fn test_initial_value_does_not_fire_change() {
        let (log, on_change) = collected();
        let _editor = Editor::new("<p>seed</p>", on_change);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_keystroke_emits_once_and_echo_loads_nothing() {
        let (log, on_change) = collected();
        let mut editor = Editor::new("<p>hello</p>", on_change);

        editor.set_selection(Selection::collapsed(5));
        assert!(editor.run(&Command::InsertText { text: "!".into() }));
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(log.borrow()[0], "<p>hello!</p>\n");

        // The host feeds the emitted value back as the external value.
        let echo = log.borrow()[0].clone();
        assert!(!editor.set_value(&echo));
        // Cursor survived its own edit.
        assert_eq!(editor.selection(), Selection::collapsed(6));
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_rejected_command_emits_nothing() {
        let (log, on_change) = collected();
        let mut editor = Editor::new("<p>x</p>", on_change);
        editor.set_selection(Selection::collapsed(0));
        assert!(!editor.run(&Command::Undo));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_host_load_resets_and_emits_nothing() {
        let (log, on_change) = collected();
        let mut editor = Editor::new("<p>old</p>", on_change);
        assert!(editor.set_value("<p>new content</p>"));
        assert_eq!(editor.engine().doc().text_content(), "new content");
        assert_eq!(editor.selection(), Selection::collapsed(0));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_upload_lifecycle_resolve() {
        let (log, on_change) = collected();
        let mut editor = Editor::new("<p></p>", on_change);

        editor.begin_upload("u1", UploadKind::Image, "data:image/png;base64,xxxx".into());
        assert_eq!(editor.pending_upload_count(), 1);

        assert!(editor.resolve_upload("u1", "https://cdn.example.com/final.png"));
        assert_eq!(editor.pending_upload_count(), 0);
        assert!(editor.is_active(&ActiveQuery::node("image")));

        // The committed URL is in the emitted value; the preview is not.
        let html = log.borrow().last().cloned().unwrap_or_default();
        assert!(html.contains("https://cdn.example.com/final.png"));
        assert!(!html.contains("data:image/png"));
    }

    #[test]
    fn test_upload_lifecycle_failure() {
        let (log, on_change) = collected();
        let mut editor = Editor::new("<p></p>", on_change);
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = errors.clone();
        editor.on_upload_error(move |msg: &str| sink.borrow_mut().push(msg.to_string()));

        editor.begin_upload("u1", UploadKind::Media, "data:video/mp4;base64,xxxx".into());
        editor.fail_upload("u1", "upload transport failed");

        assert_eq!(editor.pending_upload_count(), 0);
        assert_eq!(errors.borrow().as_slice(), ["upload transport failed"]);
        // Nothing was inserted, nothing emitted.
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_upload_cancel_inserts_nothing() {
        let (log, on_change) = collected();
        let mut editor = Editor::new("<p></p>", on_change);

        editor.begin_upload("u1", UploadKind::Image, "data:image/png;base64,xxxx".into());
        assert!(editor.cancel_upload("u1"));
        assert!(!editor.resolve_upload("u1", "https://cdn.example.com/late.png"));
        assert!(log.borrow().is_empty());
    }
}
