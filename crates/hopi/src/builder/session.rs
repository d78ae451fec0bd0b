//! Sessions: one interpreter, its decoders and the handles built on it

use crate::builder::Handle;
use crate::builder::template::Template;
use crate::codec::{Arg, BuiltinDecoders, Codec, DecoderEntry, DecoderPack, Value};
use crate::config::SessionConfig;
use crate::error::{HopiError, Result};
use futures::future::try_join_all;
use hopi_protocol::CommandKind;
use hopi_transport::Channel;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub(crate) struct SessionInner {
    pub(crate) channel: Channel,
    pub(crate) codec: Codec,
    next_variable: AtomicU64,
    variable_prefix: String,
}

/// A running interpreter and the entry point for building handles
///
/// Cloning is cheap; clones share the interpreter, the decoder registry and
/// the variable counter.
///
/// ```no_run
/// use hopi::{Session, SessionConfig};
///
/// # async fn example() -> hopi::Result<()> {
/// let session = Session::start(SessionConfig::from_env()).await?;
/// let one = session.format("1", vec![])?;
/// let two = session.format("2", vec![])?;
/// let sum = hopi::expr!(session, "{a}+{b}", a = &one, b = &two)?;
/// assert_eq!(sum.force().await?.as_i64(), Some(3));
/// session.kill().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("channel", &self.inner.channel)
            .field("variable_prefix", &self.inner.variable_prefix)
            .field("handles", &self.inner.next_variable.load(Ordering::Relaxed))
            .finish()
    }
}

impl Session {
    /// Start an interpreter and install the builtin decoders if configured
    ///
    /// # Errors
    ///
    /// - [`HopiError::Usage`] if the variable prefix is not an identifier
    /// - [`HopiError::Transport`] if the interpreter cannot be started
    #[tracing::instrument(skip_all, fields(interpreter = %config.interpreter))]
    pub async fn start(config: SessionConfig) -> Result<Self> {
        validate_prefix(&config.variable_prefix)?;
        let channel = Channel::start(config.process_config()).await?;
        let session = Self::with_channel(channel, &config)?;

        if config.builtin_decoders {
            if let Err(e) = session.install(&BuiltinDecoders).await {
                session.kill().await;
                return Err(e);
            }
        }
        tracing::debug!("session started");
        Ok(session)
    }

    /// Build a session over an existing channel
    ///
    /// No decoders are installed; call [`Session::install`] as needed.
    ///
    /// # Errors
    ///
    /// [`HopiError::Usage`] if the variable prefix is not an identifier.
    pub fn with_channel(channel: Channel, config: &SessionConfig) -> Result<Self> {
        validate_prefix(&config.variable_prefix)?;
        Ok(Self {
            inner: Arc::new(SessionInner {
                codec: Codec::new(channel.clone()),
                channel,
                next_variable: AtomicU64::new(0),
                variable_prefix: config.variable_prefix.clone(),
            }),
        })
    }

    /// The underlying channel
    pub fn channel(&self) -> &Channel {
        &self.inner.channel
    }

    /// The decoder registry
    pub fn codec(&self) -> &Codec {
        &self.inner.codec
    }

    /// Render a host value as interpreter source
    pub fn literal(&self, arg: impl Into<Arg>) -> String {
        arg.into().render()
    }

    /// Build a handle from literal fragments interleaved with arguments
    ///
    /// `fragments` must be exactly one longer than `args`. The binding is
    /// sent once every handle among `args` is bound.
    ///
    /// # Errors
    ///
    /// [`HopiError::Usage`], with nothing sent, if the lengths disagree, an
    /// argument is a handle from another session, or the rendered expression
    /// spans several lines.
    pub fn expr<S: AsRef<str>>(&self, fragments: &[S], args: Vec<Arg>) -> Result<Handle> {
        self.inner.expr(fragments, args)
    }

    /// Build a handle from a template with `{}` or `{n}` placeholders
    ///
    /// # Errors
    ///
    /// [`HopiError::Usage`] for an invalid template, unused arguments or any
    /// [`Session::expr`] usage error.
    pub fn format(&self, template: &str, args: Vec<Arg>) -> Result<Handle> {
        let (fragments, args) = Template::parse(template)?.bind_positional(args)?;
        self.expr(&fragments, args)
    }

    /// Build a handle from a template with `{name}` placeholders
    ///
    /// # Errors
    ///
    /// See [`Session::format`].
    pub fn format_named<I, K>(&self, template: &str, args: I) -> Result<Handle>
    where
        I: IntoIterator<Item = (K, Arg)>,
        K: Into<String>,
    {
        let args: HashMap<String, Arg> = args.into_iter().map(|(k, v)| (k.into(), v)).collect();
        let (fragments, args) = Template::parse(template)?.bind_named(args)?;
        self.expr(&fragments, args)
    }

    /// Execute statements
    ///
    /// # Errors
    ///
    /// [`HopiError::RemoteExecution`] if they raise; statements before the
    /// failing one keep their effects.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn exec(&self, source: &str) -> Result<()> {
        self.inner
            .channel
            .send_and_receive(CommandKind::Exec, source)
            .await?;
        Ok(())
    }

    /// Evaluate an expression and decode the result
    ///
    /// # Errors
    ///
    /// [`HopiError::RemoteExecution`] if it raises, [`HopiError::Decode`] if
    /// the result cannot be decoded.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn eval(&self, source: &str) -> Result<Value> {
        let payload = self
            .inner
            .channel
            .send_and_receive(CommandKind::Eval, source)
            .await?;
        Ok(self.inner.codec.decode(&payload)?)
    }

    /// [`Session::exec`] over a template, once its handles are bound
    ///
    /// # Errors
    ///
    /// Template usage errors, dependency errors, then as [`Session::exec`].
    pub async fn exec_with(&self, template: &str, args: Vec<Arg>) -> Result<()> {
        let source = self.render_bound(template, args).await?;
        self.exec(&source).await
    }

    /// [`Session::eval`] over a template, once its handles are bound
    ///
    /// # Errors
    ///
    /// Template usage errors, dependency errors, then as [`Session::eval`].
    pub async fn eval_with(&self, template: &str, args: Vec<Arg>) -> Result<Value> {
        let source = self.render_bound(template, args).await?;
        self.eval(&source).await
    }

    async fn render_bound(&self, template: &str, args: Vec<Arg>) -> Result<String> {
        let (fragments, args) = Template::parse(template)?.bind_positional(args)?;
        let dependencies = self.inner.collect_dependencies(&args)?;
        let source = render(&fragments, &args)?;
        try_join_all(dependencies.iter().map(Handle::resolution)).await?;
        Ok(source)
    }

    /// Import a module and return a handle bound to it
    ///
    /// # Errors
    ///
    /// [`HopiError::Usage`] for a name that is not a dotted identifier,
    /// [`HopiError::RemoteExecution`] if the import fails.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn import(&self, name: &str) -> Result<Handle> {
        if !name.split('.').all(|part| super::is_identifier(part) && !super::is_keyword(part)) {
            return Err(HopiError::usage(format!("{name:?} is not a module name")));
        }
        self.exec(&format!("import {name}")).await?;
        self.expr(&[name], Vec::new())
    }

    /// Register a decoder, see [`Codec::register`]
    ///
    /// # Errors
    ///
    /// See [`Codec::register`].
    #[tracing::instrument(skip_all, fields(tag = %entry.type_tag), level = "debug")]
    pub async fn register(&self, entry: DecoderEntry) -> Result<()> {
        self.inner.codec.register(entry).await
    }

    /// Register every decoder of a pack
    ///
    /// # Errors
    ///
    /// See [`Codec::install`].
    #[tracing::instrument(skip_all, fields(pack = pack.name()), level = "debug")]
    pub async fn install<P>(&self, pack: &P) -> Result<()>
    where
        P: DecoderPack + ?Sized + Sync,
    {
        self.inner.codec.install(pack).await
    }

    /// Terminate the interpreter
    ///
    /// Outstanding operations fail with [`HopiError::Transport`] and every
    /// handle becomes [`crate::HandleState::Closed`].
    pub async fn kill(&self) {
        self.inner.channel.kill().await;
        tracing::debug!("session killed");
    }
}

impl SessionInner {
    pub(crate) fn expr<S: AsRef<str>>(self: &Arc<Self>, fragments: &[S], args: Vec<Arg>) -> Result<Handle> {
        if fragments.len() != args.len() + 1 {
            return Err(HopiError::usage(format!(
                "{} fragments cannot surround {} arguments",
                fragments.len(),
                args.len()
            )));
        }

        let dependencies = self.collect_dependencies(&args)?;
        let expression = render(fragments, &args)?;
        let name = format!(
            "{}{}",
            self.variable_prefix,
            self.next_variable.fetch_add(1, Ordering::Relaxed)
        );

        Ok(Handle::bind(Arc::clone(self), name, expression, dependencies))
    }

    /// Handles among `args`, once each, all belonging to this session
    fn collect_dependencies(self: &Arc<Self>, args: &[Arg]) -> Result<Vec<Handle>> {
        let mut seen = HashSet::new();
        let mut dependencies = Vec::new();
        let mut foreign = None;

        for arg in args {
            arg.for_each_handle(&mut |handle| {
                if !handle.belongs_to(self) {
                    foreign.get_or_insert_with(|| handle.name().to_string());
                } else if seen.insert(handle.name()) {
                    dependencies.push(handle.clone());
                }
            });
        }

        match foreign {
            Some(name) => Err(HopiError::usage(format!(
                "handle {name} belongs to another session"
            ))),
            None => Ok(dependencies),
        }
    }
}

fn render<S: AsRef<str>>(fragments: &[S], args: &[Arg]) -> Result<String> {
    let mut source = String::new();
    for (i, fragment) in fragments.iter().enumerate() {
        source.push_str(fragment.as_ref());
        if let Some(arg) = args.get(i) {
            arg.render_into(&mut source);
        }
    }
    if source.contains(['\n', '\r']) {
        return Err(HopiError::usage("expressions must fit on a single line"));
    }
    Ok(source)
}

fn validate_prefix(prefix: &str) -> Result<()> {
    if super::is_identifier(prefix) {
        Ok(())
    } else {
        Err(HopiError::usage(format!(
            "variable prefix {prefix:?} is not an identifier"
        )))
    }
}
