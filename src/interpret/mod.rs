//! The command interpreter.
//!
//! A [`Session`] owns everything a command can touch ([`CommandContext`]),
//! the handler [`Registry`] and at most one pending [`TextContinuation`].
//! Input goes through three stages:
//!
//! 1. **Tokenize** - commands, quoted text and `<? … ?>` script blocks.
//! 2. **Preprocess** - macros, replace rules, comments.
//! 3. **Dispatch** - commands to the newest matching handler, texts to the
//!    pending continuation, scripts to the [`ScriptHost`].
//!
//! Dispatch stops at the first failing token. Everything earlier tokens did
//! stays in the scene.

pub mod generators;
pub mod handlers;
pub mod registry;
pub mod state;

use glam::dvec2;

use crate::draw::{DrawCommand, Drawer};
use crate::errors::{Error, Result};
use crate::geometry::{ResolvedMap, Resolver, TextMeasurer};
use crate::log::{debug, trace};
use crate::model::{Body, Object, ObjectId, PathItem};
use crate::preprocess::Preprocessor;
use crate::scene::{IdGen, SceneGraph, Snapshot};
use crate::settings::Settings;
use crate::tokenizer::{Token, TokenKind, Tokenizer, tokenize};

pub use generators::{Generated, Generator, Generators};
pub use registry::{Handler, PatternHandler, Registry, TextContinuation};
pub use state::{FilterMode, Phase, Target};

/// Runs `<? … ?>` blocks.
pub trait ScriptHost {
    /// Returned text is parsed as more commands.
    fn run(&mut self, script: &str, scene: &SceneGraph) -> Result<Option<String>>;
}

/// State handlers read and write.
#[derive(Debug, Default)]
pub struct CommandContext {
    pub scene: SceneGraph,
    pub ids: IdGen,
    pub phase: Phase,
    pub settings: Settings,
    pub preprocessor: Preprocessor,
    pub generators: Generators,
}

impl CommandContext {
    pub fn new(settings: Settings) -> Self {
        CommandContext {
            settings,
            generators: Generators::builtin(),
            ..Self::default()
        }
    }

    /// Ids the current clause applies to.
    pub fn targets(&self, token: &str) -> Result<Vec<ObjectId>> {
        self.phase
            .targets()
            .ok_or_else(|| Error::unsupported(token, "nothing is selected"))
    }

    /// The id of an existing object.
    pub fn require(&self, name: &str) -> Result<ObjectId> {
        let id = ObjectId::new(name);
        if self.scene.contains(&id) {
            Ok(id)
        } else {
            Err(Error::reference(name, "no object with this name"))
        }
    }

    pub fn object_mut(&mut self, id: &ObjectId) -> Result<&mut Object> {
        self.scene
            .find_mut(id)
            .ok_or_else(|| Error::reference(id.as_str(), "no such object"))
    }

    /// Finish any open path, then append a new object.
    pub fn create(&mut self, body: Body) -> Result<ObjectId> {
        self.finish_path()?;
        let id = self.ids.next_id();
        self.scene.push(Object::new(id.clone(), body));
        Ok(id)
    }

    /// Validate the path under construction, if any, and go idle.
    pub fn finish_path(&mut self) -> Result<()> {
        let Phase::BuildingPath { path, .. } = &self.phase else {
            return Ok(());
        };
        let dangling = self
            .scene
            .find_by_id(path)
            .and_then(Object::path_items)
            .and_then(<[PathItem]>::last)
            .is_some_and(PathItem::is_segment);
        if dangling {
            return Err(Error::structural(format!(
                "path {path} ends with a segment that goes nowhere"
            )));
        }
        self.phase = Phase::Idle;
        Ok(())
    }

    /// Whether `name` was marked earlier in the path under construction.
    pub fn is_mark(&self, name: &str) -> bool {
        let Phase::BuildingPath { path, .. } = &self.phase else {
            return false;
        };
        self.scene
            .find_by_id(path)
            .and_then(Object::path_items)
            .is_some_and(|items| {
                items
                    .iter()
                    .any(|item| matches!(item, PathItem::Point { id } if id.as_str() == name))
            })
    }

    /// Append to the path under construction.
    ///
    /// Segments and marks have to follow a position; the rule is checked here
    /// so the mistake is reported at the offending token.
    pub fn push_path_item(&mut self, token: &str, item: PathItem) -> Result<()> {
        let CommandContext { phase, scene, .. } = self;
        let Phase::BuildingPath { path, line } = phase else {
            return Err(Error::unsupported(token, "no path is being built"));
        };
        let items = match scene.find_mut(path).map(|o| &mut o.body) {
            Some(Body::Path { items }) => items,
            _ => return Err(Error::reference(path.as_str(), "the path being built is gone")),
        };
        let needs_position = item.is_segment() || matches!(item, PathItem::Point { .. });
        if needs_position && !items.last().is_some_and(PathItem::is_position) {
            return Err(Error::structural(format!(
                "`{token}` must follow a position in path {path}"
            )));
        }
        if matches!(item, PathItem::Line { .. }) {
            *line = Some(items.len());
        }
        trace!(path = %path, item = ?item, "path item");
        items.push(item);
        Ok(())
    }

    /// Narrow a batch to the targets `keep` accepts.
    pub fn narrow(&mut self, token: &str, keep: impl Fn(&Object) -> bool) -> Result<()> {
        let CommandContext { phase, scene, .. } = self;
        let Phase::Targeting { target, .. } = phase else {
            return Err(Error::unsupported(token, "filters need a selection"));
        };
        target.retain(|id| scene.find_by_id(id).is_some_and(&keep));
        Ok(())
    }
}

/// One interpreter session.
pub struct Session {
    registry: Registry,
    ctx: CommandContext,
    pending: Option<TextContinuation>,
    script_host: Option<Box<dyn ScriptHost>>,
    resolver: Resolver,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("objects", &self.ctx.scene.len())
            .field("phase", &self.ctx.phase.name())
            .field("pending", &self.pending)
            .finish()
    }
}

impl Session {
    pub fn new() -> Result<Self> {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Result<Self> {
        let mut registry = Registry::new();
        handlers::register_defaults(&mut registry)?;
        Ok(Session {
            registry,
            resolver: Resolver::new(&settings),
            ctx: CommandContext::new(settings),
            pending: None,
            script_host: None,
        })
    }

    /// Tokenize, preprocess and dispatch `src`.
    pub fn parse(&mut self, src: &str) -> Result<()> {
        self.ctx.preprocessor.reset();
        for token in Tokenizer::new(src) {
            let token = token?;
            let span = token.span;
            let Some(token) = self.ctx.preprocessor.process(token)? else {
                continue;
            };
            self.dispatch(token).map_err(|e| e.at(span))?;
        }
        Ok(())
    }

    /// Dispatch one preprocessed token.
    pub fn dispatch(&mut self, token: Token) -> Result<()> {
        // a macro can expand to several commands and texts
        if token.kind == TokenKind::Command && token.text.contains(char::is_whitespace) {
            for inner in tokenize(&token.text)? {
                self.dispatch_one(inner)?;
            }
            return Ok(());
        }
        self.dispatch_one(token)
    }

    fn dispatch_one(&mut self, token: Token) -> Result<()> {
        match token.kind {
            TokenKind::Command => self.command(&token.text),
            TokenKind::Text => self.text(&token.text),
            TokenKind::Script => self.script(&token.text),
        }
    }

    fn command(&mut self, text: &str) -> Result<()> {
        let handler = self
            .registry
            .find(text)
            .ok_or_else(|| Error::unsupported(text, "no command matches"))?;
        debug!(token = text, handler = handler.name(), phase = self.ctx.phase.name(), "dispatch");
        let retains = handler.retains_continuation();
        match handler.apply(&mut self.ctx, text) {
            Ok(Some(next)) => self.pending = Some(next),
            Ok(None) if retains => {}
            Ok(None) => self.pending = None,
            Err(err) => {
                if !retains {
                    self.pending = None;
                }
                return Err(err);
            }
        }
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<()> {
        let Some(continuation) = self.pending.take() else {
            return Err(Error::unsupported(
                format!("\"{text}\""),
                "no command is waiting for text",
            ));
        };
        trace!(continuation = continuation.label(), "text");
        self.pending = continuation.call(&mut self.ctx, text)?;
        Ok(())
    }

    fn script(&mut self, body: &str) -> Result<()> {
        let Some(mut host) = self.script_host.take() else {
            return Err(Error::unsupported(
                format!("<?{body}?>"),
                "no script host is registered",
            ));
        };
        let output = host.run(body, &self.ctx.scene);
        self.script_host = Some(host);
        if let Some(commands) = output? {
            // script output is dispatched as written, without preprocessing
            for token in tokenize(&commands)? {
                self.dispatch(token)?;
            }
        }
        Ok(())
    }

    /// TikZ markup for the current scene.
    pub fn render(&self) -> Result<String> {
        crate::render::render(&self.ctx.scene, &self.ctx.settings)
    }

    /// Resolve the current scene. Label sizes are cached across calls.
    pub fn resolve(&mut self) -> Result<ResolvedMap> {
        self.resolver.update_settings(&self.ctx.settings);
        self.resolver.resolve_all(&self.ctx.scene)
    }

    /// Resolve, then produce device-space drawing commands.
    pub fn draw(&mut self) -> Result<Vec<DrawCommand>> {
        let resolved = self.resolve()?;
        Drawer::new(&self.ctx.settings).draw(&self.ctx.scene, &resolved)
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Object> {
        self.ctx.scene.find_by_id(&ObjectId::new(id))
    }

    /// Delete `id` and everything depending on it.
    pub fn delete_cascade(&mut self, id: &str) -> Result<Vec<ObjectId>> {
        let removed = self.ctx.scene.delete_cascade(&ObjectId::new(id))?;
        if removed.iter().any(|r| self.ctx.phase.mentions(r)) {
            self.ctx.phase = Phase::Idle;
            self.pending = None;
        }
        Ok(removed)
    }

    /// Copy `objects` in under fresh ids with the first absolute coordinate
    /// at `(at_x, at_y)`. See [`SceneGraph::paste_subgraph`].
    pub fn paste_subgraph(
        &mut self,
        objects: &[Object],
        at_x: f64,
        at_y: f64,
        resolved: Option<&ResolvedMap>,
    ) -> Result<Vec<ObjectId>> {
        let CommandContext {
            scene,
            ids,
            settings,
            ..
        } = &mut self.ctx;
        scene.paste_subgraph(
            ids,
            objects,
            dvec2(at_x, at_y),
            resolved,
            settings.node_distance.raw(),
        )
    }

    pub fn snapshot(&self) -> Snapshot {
        self.ctx.scene.snapshot(&self.ctx.ids)
    }

    /// Replace the scene and id counter; the interpreter goes idle.
    pub fn restore(&mut self, snapshot: Snapshot) {
        let (scene, ids) = SceneGraph::restore(snapshot);
        self.ctx.scene = scene;
        self.ctx.ids = ids;
        self.ctx.phase = Phase::Idle;
        self.pending = None;
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.ctx.scene
    }

    pub fn settings(&self) -> &Settings {
        &self.ctx.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.ctx.settings
    }

    pub fn phase(&self) -> &Phase {
        &self.ctx.phase
    }

    /// What the pending continuation is waiting for.
    pub fn pending_label(&self) -> Option<&str> {
        self.pending.as_ref().map(TextContinuation::label)
    }

    pub fn preprocessor_mut(&mut self) -> &mut Preprocessor {
        &mut self.ctx.preprocessor
    }

    /// Handlers registered later take precedence.
    pub fn register(&mut self, handler: impl Handler + 'static) {
        self.registry.register(handler);
    }

    pub fn register_generator(&mut self, generator: impl Generator + 'static) {
        self.ctx.generators.register(generator);
    }

    pub fn set_script_host(&mut self, host: impl ScriptHost + 'static) {
        self.script_host = Some(Box::new(host));
    }

    /// Measure labels with `measurer` from now on.
    pub fn set_measurer(&mut self, measurer: Box<dyn TextMeasurer>) {
        self.resolver = Resolver::with_measurer(&self.ctx.settings, measurer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Relationship;

    fn session(src: &str) -> Session {
        let mut s = Session::new().unwrap();
        s.parse(src).unwrap();
        s
    }

    #[test]
    fn text_goes_to_the_new_box() {
        let s = session(r#"there.is.a.box "hello""#);
        assert_eq!(s.find_by_id("id0").unwrap().text.as_deref(), Some("hello"));
        assert!(s.pending_label().is_none());
    }

    #[test]
    fn modifiers_keep_the_continuation() {
        let s = session(r#"there.is.a.box with.color.red dashed "late text""#);
        let obj = s.find_by_id("id0").unwrap();
        assert_eq!(obj.text.as_deref(), Some("late text"));
        assert_eq!(obj.style.color.as_deref(), Some("red"));
    }

    #[test]
    fn stray_text_is_unsupported() {
        let mut s = Session::new().unwrap();
        let err = s.parse(r#""orphan""#).unwrap_err();
        assert!(matches!(err, Error::UnsupportedCommand { .. }));
    }

    #[test]
    fn errors_carry_the_token_span() {
        let mut s = Session::new().unwrap();
        let err = s.parse("there.is.a.box flibbertigibbet").unwrap_err();
        let span = err.span().unwrap();
        assert_eq!(span.offset(), 15);
        assert_eq!(span.len(), "flibbertigibbet".len());
        // earlier tokens stay applied
        assert_eq!(s.scene().len(), 1);
    }

    #[test]
    fn scripts_need_a_host() {
        let mut s = Session::new().unwrap();
        assert!(matches!(
            s.parse("<? anything ?>"),
            Err(Error::UnsupportedCommand { .. })
        ));
    }

    struct Echo;

    impl ScriptHost for Echo {
        fn run(&mut self, script: &str, scene: &SceneGraph) -> Result<Option<String>> {
            let n = scene.len();
            Ok(Some(format!("there.is.a.text \"{} after {n}\"", script.trim())))
        }
    }

    #[test]
    fn script_output_is_parsed() {
        let mut s = Session::new().unwrap();
        s.set_script_host(Echo);
        s.parse("there.is.a.box <? hi ?>").unwrap();
        assert_eq!(s.scene().len(), 2);
        assert_eq!(s.find_by_id("id1").unwrap().text.as_deref(), Some("hi after 1"));
    }

    #[test]
    fn macros_can_expand_to_several_commands() {
        let s = session(
            r#"define.pair "there.is.a.box there.is.a.circle with.right.of.id0" \pair"#,
        );
        assert_eq!(s.scene().len(), 2);
        assert!(matches!(
            s.find_by_id("id1").unwrap().placement(),
            Some(Relationship::DirectionalOffset { .. })
        ));
    }

    #[test]
    fn deleting_the_target_goes_idle() {
        let mut s = session("there.is.a.box");
        s.delete_cascade("id0").unwrap();
        assert_eq!(*s.phase(), Phase::Idle);
        assert!(s.pending_label().is_none());
    }

    #[test]
    fn restore_rolls_back() {
        let mut s = session("there.is.a.box");
        let saved = s.snapshot();
        s.parse("there.is.a.circle").unwrap();
        s.restore(saved);
        assert_eq!(s.scene().len(), 1);
        s.parse("there.is.a.box").unwrap();
        // the counter comes from the snapshot
        assert!(s.find_by_id("id1").is_some());
    }

    #[test]
    fn resolve_follows_setting_changes() {
        let mut s = session(r#"there.is.a.box "wide label""#);
        let before = s.resolve().unwrap().get(&ObjectId::new("id0")).unwrap().width;
        s.settings_mut().inner_sep = crate::types::Length(1.0);
        let after = s.resolve().unwrap().get(&ObjectId::new("id0")).unwrap().width;
        assert!((after - before - 1.8).abs() < 1e-9);
    }

    #[test]
    fn paste_goes_through_the_session() {
        let mut s = session("there.is.a.box at.(1,1)");
        let copied: Vec<Object> = s.scene().objects().to_vec();
        let ids = s.paste_subgraph(&copied, 5.0, 5.0, None).unwrap();
        assert_eq!(ids, vec![ObjectId::new("id1")]);
        assert_eq!(
            s.find_by_id("id1").unwrap().placement(),
            Some(&Relationship::AbsoluteCoordinate { x: 5.0, y: 5.0 })
        );
    }
}
