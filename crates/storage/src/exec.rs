//! DB operation executor logic.
//!
//! This manages the indirection to spawn async requests onto a threadpool
//! and execute blocking calls locally.

use std::sync::Arc;

use chainweb_db::errors::DbError;
use chainweb_db::DbResult;
use threadpool::ThreadPool;
use tokio::sync::oneshot;
use tracing::warn;

/// Shim to opaquely execute the operation without being aware of the
/// underlying impl.
pub(crate) struct OpShim<T, R> {
    executor_fn: Arc<dyn Fn(T) -> DbResult<R> + Sync + Send + 'static>,
}

impl<T, R> OpShim<T, R>
where
    T: Sync + Send + 'static,
    R: Sync + Send + 'static,
{
    pub(crate) fn wrap<F>(op: F) -> Self
    where
        F: Fn(T) -> DbResult<R> + Sync + Send + 'static,
    {
        Self {
            executor_fn: Arc::new(op),
        }
    }

    /// Executes the operation on the provided thread pool and returns the
    /// result over.
    pub(crate) async fn exec_async(&self, pool: &ThreadPool, arg: T) -> DbResult<R> {
        let (resp_tx, resp_rx) = oneshot::channel();

        let exec_fn = self.executor_fn.clone();

        pool.execute(move || {
            let res = exec_fn(arg);
            if resp_tx.send(res).is_err() {
                warn!("failed to send db op response");
            }
        });

        match resp_rx.await {
            Ok(v) => v,
            Err(e) => Err(DbError::Other(format!("{e}"))),
        }
    }

    /// Executes the operation directly.
    pub(crate) fn exec_blocking(&self, arg: T) -> DbResult<R> {
        (self.executor_fn)(arg)
    }
}

/// Instantiates a manager struct whose operations run through [`OpShim`],
/// generating a blocking and an async entry point per op from a free
/// function over the context.
macro_rules! inst_ops {
    {
        ($base:ident, $ctx:ident $(<$($tparam:ident: $tpconstr:path),+>)?) {
            $($iname:ident($arg:ty) => $ret:ty [$bname:ident, $aname:ident];)*
        }
    } => {
        pub struct $base {
            pool: ::threadpool::ThreadPool,
            $($iname: $crate::exec::OpShim<$arg, $ret>,)*
        }

        impl $base {
            pub fn new $(<$($tparam: $tpconstr + Sync + Send + 'static),+>)? (
                pool: ::threadpool::ThreadPool,
                ctx: ::std::sync::Arc<$ctx $(<$($tparam),+>)?>,
            ) -> Self {
                Self {
                    pool,
                    $($iname: {
                        let ctx = ctx.clone();
                        $crate::exec::OpShim::wrap(move |arg| $iname(ctx.as_ref(), arg))
                    },)*
                }
            }

            $(
                pub fn $bname(&self, arg: $arg) -> ::chainweb_db::DbResult<$ret> {
                    self.$iname.exec_blocking(arg)
                }

                pub async fn $aname(&self, arg: $arg) -> ::chainweb_db::DbResult<$ret> {
                    self.$iname.exec_async(&self.pool, arg).await
                }
            )*
        }
    }
}

pub(crate) use inst_ops;
