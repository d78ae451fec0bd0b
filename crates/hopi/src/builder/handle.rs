//! Lazy references to remote values

use crate::builder::call::CallArg;
use crate::builder::session::SessionInner;
use crate::builder::state::{HandleState, StateCell};
use crate::builder::template::Template;
use crate::builder::{is_identifier, is_keyword};
use crate::codec::{Arg, Value, literal};
use crate::error::{HopiError, Result};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared, try_join_all};
use hopi_protocol::{CommandKind, RequestId};
use hopi_transport::{Channel, ChannelError};
use serde::de::DeserializeOwned;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Completion of a handle's binding, awaitable by any number of callers
pub(crate) type Resolution = Shared<BoxFuture<'static, Result<()>>>;

/// A lazily bound value in the interpreter
///
/// Each handle owns a remote variable. The variable is bound once every
/// handle the expression refers to is bound; this runs in the background, so
/// building handles never waits. Building on a handle returns a new handle and
/// never changes the original.
///
/// ```no_run
/// # async fn example(session: &hopi::Session) -> hopi::Result<()> {
/// let text = session.format("{}", vec!["a,b,c".into()])?;
/// let parts = text.attr("split")?.call(hopi::args![","])?;
/// let last = parts.index(-1)?;
/// assert_eq!(last.force().await?.as_str(), Some("c"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Handle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    session: Arc<SessionInner>,
    name: String,
    expression: String,
    dependencies: Vec<Handle>,
    state: Arc<StateCell>,
    resolved: Resolution,
}

/// How the binding command gets onto the channel
enum Binding {
    /// Dependencies were already bound; sent while building the handle
    Sent(std::result::Result<RequestId, ChannelError>),
    /// Sent once the dependencies resolve
    Deferred(Vec<Resolution>),
}

impl Handle {
    /// Build a handle and schedule its binding
    pub(crate) fn bind(
        session: Arc<SessionInner>,
        name: String,
        expression: String,
        dependencies: Vec<Handle>,
    ) -> Self {
        let state = Arc::new(StateCell::new(HandleState::Created));

        let resolved = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let channel = session.channel.clone();
                let command = format!("{name} = {expression}");

                let binding = if dependencies.iter().all(Handle::is_bound) {
                    state.set(HandleState::Resolving);
                    Binding::Sent(channel.send(CommandKind::Exec, &command))
                } else {
                    Binding::Deferred(dependencies.iter().map(|d| d.inner.resolved.clone()).collect())
                };

                let task = runtime.spawn(resolve(channel, command, binding, Arc::clone(&state)));
                async move {
                    task.await.unwrap_or_else(|e| {
                        Err(HopiError::Transport(format!("binding task stopped: {e}")))
                    })
                }
                .boxed()
                .shared()
            }
            Err(_) => {
                state.set(HandleState::Failed);
                let err = HopiError::usage("handles must be built inside a Tokio runtime");
                futures::future::ready(Err(err)).boxed().shared()
            }
        };

        tracing::trace!(%name, %expression, deps = dependencies.len(), "built handle");

        Self {
            inner: Arc::new(HandleInner {
                session,
                name,
                expression,
                dependencies,
                state,
                resolved,
            }),
        }
    }

    /// Remote variable holding this handle's value
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Source text the variable is bound to
    pub fn expression(&self) -> &str {
        &self.inner.expression
    }

    /// Handles this one was built from, without duplicates
    pub fn dependencies(&self) -> &[Handle] {
        &self.inner.dependencies
    }

    /// Current lifecycle state
    pub fn state(&self) -> HandleState {
        if self.inner.session.channel.is_closed() {
            return HandleState::Closed;
        }
        self.inner.state.get()
    }

    fn is_bound(&self) -> bool {
        self.inner.state.get().is_bound()
    }

    pub(crate) fn belongs_to(&self, session: &Arc<SessionInner>) -> bool {
        Arc::ptr_eq(&self.inner.session, session)
    }

    pub(crate) fn resolution(&self) -> Resolution {
        self.inner.resolved.clone()
    }

    /// Wait until the remote variable is bound
    ///
    /// # Errors
    ///
    /// The error that failed this handle or any of its dependencies.
    pub async fn resolved(&self) -> Result<()> {
        self.inner.resolved.clone().await
    }

    /// Fetch and decode the current value
    ///
    /// Every call evaluates the variable again.
    ///
    /// # Errors
    ///
    /// - the binding error, see [`Handle::resolved`]
    /// - [`HopiError::RemoteExecution`] if evaluation raises
    /// - [`HopiError::Decode`] if the result cannot be decoded
    pub async fn force(&self) -> Result<Value> {
        self.resolved().await?;
        let session = &self.inner.session;
        let payload = session
            .channel
            .send_and_receive(CommandKind::Eval, &self.inner.name)
            .await?;
        let value = session.codec.decode(&payload)?;
        self.inner.state.mark_evaluated();
        Ok(value)
    }

    /// Fetch the current value and deserialize it into `T`
    ///
    /// # Errors
    ///
    /// See [`Handle::force`]; a value that does not fit `T` is a
    /// [`HopiError::Decode`].
    pub async fn force_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(self.force().await?.deserialize()?)
    }

    fn derive(&self, fragments: &[&str], args: Vec<Arg>) -> Result<Handle> {
        let mut all = Vec::with_capacity(args.len() + 1);
        all.push(Arg::Handle(self.clone()));
        all.extend(args);
        self.inner.session.expr(fragments, all)
    }

    /// `(parent<operator>rhs)`
    pub(crate) fn infix(&self, operator: &str, rhs: Arg) -> Result<Handle> {
        self.inner
            .session
            .expr(&["(", operator, ")"], vec![Arg::Handle(self.clone()), rhs])
    }

    /// `<open>parent<close>`
    pub(crate) fn enclosed(&self, open: &str, close: &str) -> Result<Handle> {
        self.inner
            .session
            .expr(&[open, close], vec![Arg::Handle(self.clone())])
    }

    /// `parent.name`, or `parent["name"]` when `name` is not an identifier
    ///
    /// # Errors
    ///
    /// [`HopiError::Usage`] if the handle cannot be built.
    pub fn attr(&self, name: &str) -> Result<Handle> {
        if is_identifier(name) && !is_keyword(name) {
            self.derive(&["", &format!(".{name}")], Vec::new())
        } else {
            self.derive(&["", &format!("[{}]", literal::quote(name))], Vec::new())
        }
    }

    /// `parent[key]`
    ///
    /// # Errors
    ///
    /// [`HopiError::Usage`] if `key` refers to another session's handle.
    pub fn index(&self, key: impl Into<Arg>) -> Result<Handle> {
        self.derive(&["", "[", "]"], vec![key.into()])
    }

    /// [`Handle::attr`] for identifier strings, [`Handle::index`] for the rest
    ///
    /// # Errors
    ///
    /// See [`Handle::index`].
    pub fn item(&self, key: impl Into<Arg>) -> Result<Handle> {
        match key.into() {
            Arg::Str(name) if is_identifier(&name) && !is_keyword(&name) => self.attr(&name),
            key => self.index(key),
        }
    }

    /// `parent` followed by a template, for syntax the other builders lack
    ///
    /// ```no_run
    /// # async fn example(xs: &hopi::Handle) -> hopi::Result<()> {
    /// let tail = xs.raw("[{}:]", vec![1.into()])?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// [`HopiError::Usage`] for an invalid template or unused arguments.
    pub fn raw(&self, template: &str, args: Vec<Arg>) -> Result<Handle> {
        let (mut fragments, args) = Template::parse(template)?.bind_positional(args)?;
        fragments.insert(0, String::new());
        let fragments: Vec<&str> = fragments.iter().map(String::as_str).collect();
        self.derive(&fragments, args)
    }

    /// `parent(a1,a2,k=v)`
    ///
    /// # Errors
    ///
    /// [`HopiError::Usage`], with nothing sent, if a [`CallArg::Keywords`]
    /// is not the last argument or a keyword is not an identifier.
    pub fn call<I>(&self, args: I) -> Result<Handle>
    where
        I: IntoIterator<Item = CallArg>,
    {
        // text before each value; the parent handle is the first value
        let mut fragments = vec![String::new()];
        let mut pending = String::from("(");
        let mut values = Vec::new();
        let mut keywords_seen = false;

        for arg in args {
            match arg {
                CallArg::Positional(value) => {
                    if keywords_seen {
                        return Err(HopiError::usage("kwargs need to be last"));
                    }
                    if !values.is_empty() {
                        pending.push(',');
                    }
                    fragments.push(std::mem::take(&mut pending));
                    values.push(value);
                }
                CallArg::Keywords(kwargs) => {
                    if keywords_seen {
                        return Err(HopiError::usage("kwargs need to be last"));
                    }
                    keywords_seen = true;
                    for (name, value) in kwargs.iter() {
                        if !is_identifier(name) || is_keyword(name) {
                            return Err(HopiError::usage(format!(
                                "keyword {name:?} is not a valid identifier"
                            )));
                        }
                        if !values.is_empty() {
                            pending.push(',');
                        }
                        pending.push_str(name);
                        pending.push('=');
                        fragments.push(std::mem::take(&mut pending));
                        values.push(value.clone());
                    }
                }
            }
        }
        pending.push(')');
        fragments.push(pending);

        let fragments: Vec<&str> = fragments.iter().map(String::as_str).collect();
        self.derive(&fragments, values)
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("name", &self.inner.name)
            .field("expression", &self.inner.expression)
            .field("state", &self.state())
            .finish()
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner.session, &other.inner.session) && self.inner.name == other.inner.name
    }
}

impl Eq for Handle {}

impl Hash for Handle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.name.hash(state);
    }
}

async fn resolve(channel: Channel, command: String, binding: Binding, state: Arc<StateCell>) -> Result<()> {
    let outcome = async {
        let id = match binding {
            Binding::Sent(sent) => sent?,
            Binding::Deferred(dependencies) => {
                state.set(HandleState::Resolving);
                try_join_all(dependencies).await?;
                channel.send(CommandKind::Exec, &command)?
            }
        };
        channel.receive_payload(id).await?;
        Ok::<(), HopiError>(())
    }
    .await;

    match &outcome {
        Ok(()) => {
            state.set(HandleState::Bound);
            tracing::trace!(%command, "bound");
        }
        Err(e) => {
            state.set(HandleState::Failed);
            tracing::debug!(%command, error = %e, "binding failed");
        }
    }
    outcome
}
