//! Page-side message dispatcher.
//!
//! Turns inbound bus messages into swaps, reloads and runtime calls. Work
//! that waits on the page (reloads, removals) runs in background tasks so a
//! slow swap never holds up the next message.

use super::BusMessage;
use crate::debug;
use crate::swap::{
    EXTERNALS_ELEMENT, INTERNALS_ELEMENT, ReloadAllMode, ResourceKind, Runtime, Swapper,
    script_name,
};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};

#[derive(Default)]
struct SessionState {
    editor_location: Option<Map<String, Value>>,
    view_locations: Option<Map<String, Value>>,
}

pub struct LiveSession {
    swapper: Swapper,
    runtime: Arc<dyn Runtime>,
    reload_all_mode: ReloadAllMode,
    state: Mutex<SessionState>,
}

impl LiveSession {
    pub fn new(swapper: Swapper, runtime: Arc<dyn Runtime>) -> Self {
        Self {
            swapper,
            runtime,
            reload_all_mode: ReloadAllMode::default(),
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn with_reload_all_mode(mut self, mode: ReloadAllMode) -> Self {
        self.reload_all_mode = mode;
        self
    }

    pub fn editor_location(&self) -> Option<Map<String, Value>> {
        self.state.lock().editor_location.clone()
    }

    pub fn view_locations(&self) -> Option<Map<String, Value>> {
        self.state.lock().view_locations.clone()
    }

    /// Dispatch until the sender side closes.
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<BusMessage>) {
        while let Some(message) = rx.recv().await {
            self.handle(message);
        }
    }

    /// Dispatch one message. Returns the background task when the message
    /// started one.
    pub fn handle(&self, message: BusMessage) -> Option<JoinHandle<()>> {
        match message {
            BusMessage::EditorLocation { location } => {
                self.state.lock().editor_location = Some(location);
                None
            }
            BusMessage::ViewLocations { locations } => {
                self.state.lock().view_locations = Some(locations);
                None
            }
            BusMessage::ScriptAdd { name, src, .. } => {
                let key = script_name(&name);
                let source = src.unwrap_or_else(|| ResourceKind::Script.default_locator(key));
                self.swapper.swap(ResourceKind::Script, key, &source);
                None
            }
            BusMessage::StylesheetAdd { view } => {
                let source = ResourceKind::Stylesheet.default_locator(&view);
                self.swapper.swap(ResourceKind::Stylesheet, &view, &source);
                None
            }
            BusMessage::StylesheetRemove { view } => {
                let swapper = self.swapper.clone();
                Some(tokio::spawn(async move {
                    swapper.remove_stylesheet(&view).await;
                }))
            }
            BusMessage::CompileError { error } => {
                self.runtime.show_error(&error);
                None
            }
            BusMessage::CompileSuccess => {
                self.runtime.clear_error();
                None
            }
            BusMessage::PackagesReload => {
                let swapper = self.swapper.clone();
                let runtime = self.runtime.clone();
                Some(tokio::spawn(async move {
                    let outcome = swapper.reload_one(EXTERNALS_ELEMENT, runtime).await;
                    debug!("reload"; "packages: {:?}", outcome);
                }))
            }
            BusMessage::InternalsReload => {
                let swapper = self.swapper.clone();
                let runtime = self.runtime.clone();
                let mode = self.reload_all_mode;
                Some(tokio::spawn(async move {
                    let outcome = swapper.reload_all(INTERNALS_ELEMENT, runtime, mode).await;
                    debug!("reload"; "internals: {:?}", outcome);
                }))
            }
            BusMessage::FileDelete { name } => {
                let swapper = self.swapper.clone();
                let runtime = self.runtime.clone();
                Some(tokio::spawn(async move {
                    for view in runtime.views_of_file(&name) {
                        swapper.remove_stylesheet(&view).await;
                    }
                    swapper.remove_script(&name).await;
                    runtime.delete_file(&name);
                }))
            }
            other => {
                debug!("session"; "ignoring {}", other.kind());
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{CompileFailure, RecordingNotifier};
    use crate::swap::{Container, MemoryHost, MemoryRuntime, ResourceHost};

    struct Fixture {
        host: Arc<MemoryHost>,
        runtime: Arc<MemoryRuntime>,
        notifier: Arc<RecordingNotifier>,
        session: LiveSession,
    }

    fn fixture() -> Fixture {
        let host = Arc::new(MemoryHost::new());
        let runtime = Arc::new(MemoryRuntime::ready());
        let notifier = Arc::new(RecordingNotifier::default());
        let swapper = Swapper::new(host.clone(), notifier.clone());
        let session = LiveSession::new(swapper, runtime.clone());
        Fixture {
            host,
            runtime,
            notifier,
            session,
        }
    }

    fn json(s: &str) -> BusMessage {
        BusMessage::from_json(s).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_script_add_uses_default_locator() {
        let f = fixture();
        f.session
            .handle(json(r#"{"type":"script:add","name":"/main.js","timestamp":1}"#));
        f.session.swapper.when_idle("main").await;

        let scripts = f.host.attached(ResourceKind::Script);
        assert_eq!(scripts.len(), 1);
        let src = f.host.locator_of(scripts[0]).unwrap();
        assert!(src.starts_with("/_/main.js?"));
        assert_eq!(f.notifier.kinds(), vec!["file:load", "file:done"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_script_add_with_src() {
        let f = fixture();
        f.session.handle(json(
            r#"{"type":"script:add","name":"main","timestamp":1,"src":"/custom/main.js"}"#,
        ));
        f.session.swapper.when_idle("main").await;

        let scripts = f.host.attached(ResourceKind::Script);
        assert!(f.host.locator_of(scripts[0]).unwrap().starts_with("/custom/main.js?"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stylesheet_add_and_remove() {
        let f = fixture();
        f.session
            .handle(json(r#"{"type":"stylesheet:add","view":"Main"}"#));
        f.session.swapper.when_idle("Main").await;
        assert_eq!(f.host.attached(ResourceKind::Stylesheet).len(), 1);

        let task = f
            .session
            .handle(json(r#"{"type":"stylesheet:remove","view":"Main"}"#))
            .unwrap();
        task.await.unwrap();
        assert!(f.host.attached(ResourceKind::Stylesheet).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_compile_error_then_success() {
        let f = fixture();
        f.session.handle(BusMessage::compile_error("unexpected token", None));
        assert_eq!(
            f.runtime.shown_error(),
            Some(CompileFailure {
                message: "unexpected token".into(),
                file: None
            })
        );

        f.session.handle(BusMessage::CompileSuccess);
        assert_eq!(f.runtime.shown_error(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_packages_reload_swaps_externals() {
        let f = fixture();
        let externals = f.host.insert(
            ResourceKind::Script,
            &[("id", EXTERNALS_ELEMENT), ("src", "/__/packages.js")],
            Container::Body,
        );

        let task = f.session.handle(BusMessage::PackagesReload).unwrap();
        task.await.unwrap();

        assert_eq!(f.host.container_of(externals), None);
        assert_eq!(f.runtime.renders(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_internals_reload() {
        let f = fixture();
        f.host.insert(
            ResourceKind::Script,
            &[("src", "/_/main.js"), ("class", "__flintScript")],
            Container::Body,
        );

        let task = f.session.handle(BusMessage::InternalsReload).unwrap();
        task.await.unwrap();

        assert_eq!(f.runtime.resets(), 1);
        assert_eq!(f.runtime.renders(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_internals_reload_fixed_delay() {
        let mut f = fixture();
        f.session = f.session.with_reload_all_mode(ReloadAllMode::FixedDelay);
        f.host.insert(
            ResourceKind::Script,
            &[("src", "/_/main.js"), ("class", "__flintScript")],
            Container::Body,
        );

        let task = f.session.handle(BusMessage::InternalsReload).unwrap();
        task.await.unwrap();

        assert_eq!(f.runtime.resets(), 1);
        assert_eq!(f.runtime.renders(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_file_delete_removes_views_and_script() {
        let f = fixture();
        f.runtime.define_views("/main.js", &["Main", "Header"]);
        for view in ["Main", "Header"] {
            let href = format!("/__/styles/{view}.css");
            f.host.insert(
                ResourceKind::Stylesheet,
                &[("href", href.as_str()), ("rel", "stylesheet")],
                Container::Head,
            );
        }
        f.host
            .insert(ResourceKind::Script, &[("src", "/_/main.js?3")], Container::Body);

        let task = f
            .session
            .handle(json(r#"{"type":"file:delete","name":"/main.js"}"#))
            .unwrap();
        task.await.unwrap();

        assert!(f.host.attached(ResourceKind::Stylesheet).is_empty());
        assert!(f.host.attached(ResourceKind::Script).is_empty());
        assert_eq!(f.runtime.deleted(), vec!["/main.js".to_string()]);
        assert!(f.runtime.views_of_file("/main.js").is_empty());
    }

    #[tokio::test]
    async fn test_locations_are_stored() {
        let f = fixture();
        f.session
            .handle(json(r#"{"type":"editor:location","view":"Main","line":4}"#));
        f.session
            .handle(json(r#"{"type":"view:locations","Main":[1,2]}"#));

        let location = f.session.editor_location().unwrap();
        assert_eq!(location.get("line"), Some(&Value::from(4)));
        assert!(f.session.view_locations().unwrap().contains_key("Main"));
    }

    #[tokio::test]
    async fn test_outbound_messages_ignored() {
        let f = fixture();
        assert!(f
            .session
            .handle(BusMessage::PackageInstall { name: "x".into() })
            .is_none());
        assert!(f.notifier.messages().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_closed() {
        let f = fixture();
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(BusMessage::compile_error("boom", None)).unwrap();
        drop(tx);

        let runtime = f.runtime.clone();
        f.session.run(rx).await;
        assert!(runtime.shown_error().is_some());
    }
}
