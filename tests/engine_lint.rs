#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! AST-level checks on the crate's own sources.
//!
//! - The protocol engine stays synchronous: no `async fn` and no `.await` in
//!   the engine, protocol or model modules. Only the worker in
//!   `service/runtime.rs` may suspend.
//! - No `.await` while a lock guard is held, anywhere in `src/`.
//! - No `unwrap()` or `expect()` outside test code.
//!
//! Example of bad engine code:
//! ```ignore
//! impl Engine {
//!     async fn on_status(&mut self) {
//!         self.preferences.save().await; // BAD: stalls every later line
//!     }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use syn::visit::Visit;
use syn::{Attribute, Expr, ExprAwait, ExprMethodCall, File, ImplItemFn, ItemFn, ItemMod, Local, Pat};
use walkdir::WalkDir;

/// Sources that may suspend.
const ASYNC_ALLOWED: &[&str] = &["main.rs", "transport.rs", "service/runtime.rs"];

fn is_cfg_test(attrs: &[Attribute]) -> bool {
    attrs.iter().any(|attr| {
        (attr.path().is_ident("cfg")
            && attr
                .parse_args::<syn::Ident>()
                .map_or(false, |ident| ident == "test"))
            || attr.path().is_ident("test")
    })
}

fn source_files() -> Vec<PathBuf> {
    let src_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
    WalkDir::new(&src_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map_or(false, |ext| ext == "rs"))
        .map(|e| e.into_path())
        .collect()
}

fn relative(path: &Path) -> String {
    let src_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
    path.strip_prefix(&src_dir)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn parse(path: &Path) -> Option<File> {
    let content = fs::read_to_string(path).ok()?;
    match syn::parse_file(&content) {
        Ok(syntax) => Some(syntax),
        Err(e) => {
            eprintln!("Warning: Failed to parse {}: {}", path.display(), e);
            None
        }
    }
}

// =============================================================================
// Synchronous engine
// =============================================================================

#[derive(Default)]
struct SuspendVisitor {
    violations: Vec<String>,
}

impl<'ast> Visit<'ast> for SuspendVisitor {
    fn visit_item_mod(&mut self, item: &'ast ItemMod) {
        if !is_cfg_test(&item.attrs) {
            syn::visit::visit_item_mod(self, item);
        }
    }

    fn visit_item_fn(&mut self, item: &'ast ItemFn) {
        if item.sig.asyncness.is_some() {
            self.violations.push(format!("async fn {}", item.sig.ident));
        }
        syn::visit::visit_item_fn(self, item);
    }

    fn visit_impl_item_fn(&mut self, item: &'ast ImplItemFn) {
        if item.sig.asyncness.is_some() {
            self.violations.push(format!("async fn {}", item.sig.ident));
        }
        syn::visit::visit_impl_item_fn(self, item);
    }

    fn visit_expr_await(&mut self, await_expr: &'ast ExprAwait) {
        self.violations.push(".await".to_string());
        syn::visit::visit_expr_await(self, await_expr);
    }
}

#[test]
fn detects_async_engine_code() {
    let bad_code = r#"
        impl Engine {
            async fn on_status(&mut self) {
                self.save().await;
            }
        }
    "#;

    let syntax: File = syn::parse_file(bad_code).unwrap();
    let mut visitor = SuspendVisitor::default();
    visitor.visit_file(&syntax);
    assert_eq!(visitor.violations.len(), 2);
}

#[test]
fn engine_is_synchronous() {
    let mut violations = Vec::new();
    for path in source_files() {
        let file = relative(&path);
        if ASYNC_ALLOWED.contains(&file.as_str()) {
            continue;
        }
        let Some(syntax) = parse(&path) else {
            continue;
        };
        let mut visitor = SuspendVisitor::default();
        visitor.visit_file(&syntax);
        violations.extend(visitor.violations.into_iter().map(|v| format!("{}: {}", file, v)));
    }

    assert!(
        violations.is_empty(),
        "\n\nEngine code must not suspend; move async work to the worker.\n{}\n",
        violations.join("\n")
    );
}

// =============================================================================
// Await while holding a lock
// =============================================================================

/// Tracks lock guards and detects awaits while they're held
#[derive(Default)]
struct AwaitInLockVisitor {
    scope_depth: usize,
    /// (guard name, depth when created)
    guards: Vec<(String, usize)>,
    violations: Vec<String>,
}

fn is_lock_acquisition(method: &str) -> bool {
    matches!(
        method,
        "lock" | "read" | "write" | "try_lock" | "try_read" | "try_write"
    )
}

fn is_lock_call(expr: &Expr) -> bool {
    match expr {
        Expr::Await(await_expr) => is_lock_call(&await_expr.base),
        Expr::MethodCall(call) => {
            is_lock_acquisition(&call.method.to_string())
                || (call.method == "unwrap_or_else" && is_lock_call(&call.receiver))
        }
        _ => false,
    }
}

impl<'ast> Visit<'ast> for AwaitInLockVisitor {
    fn visit_local(&mut self, local: &'ast Local) {
        if let (Some(init), Pat::Ident(pat_ident)) = (&local.init, &local.pat) {
            if is_lock_call(&init.expr) {
                self.guards
                    .push((pat_ident.ident.to_string(), self.scope_depth));
            }
        }
        syn::visit::visit_local(self, local);
    }

    fn visit_expr_await(&mut self, await_expr: &'ast ExprAwait) {
        if !is_lock_call(&await_expr.base) && !self.guards.is_empty() {
            let names: Vec<&str> = self.guards.iter().map(|(g, _)| g.as_str()).collect();
            self.violations.push(format!(
                ".await while holding lock guard(s): {}",
                names.join(", ")
            ));
        }
        syn::visit::visit_expr_await(self, await_expr);
    }

    fn visit_block(&mut self, block: &'ast syn::Block) {
        self.scope_depth += 1;
        syn::visit::visit_block(self, block);
        self.guards.retain(|(_, depth)| *depth < self.scope_depth);
        self.scope_depth -= 1;
    }

    fn visit_expr_call(&mut self, call: &'ast syn::ExprCall) {
        if let Expr::Path(path) = &*call.func {
            if path.path.is_ident("drop") {
                if let Some(Expr::Path(arg)) = call.args.first() {
                    if let Some(ident) = arg.path.get_ident() {
                        let name = ident.to_string();
                        self.guards.retain(|(g, _)| *g != name);
                    }
                }
            }
        }
        syn::visit::visit_expr_call(self, call);
    }
}

#[test]
fn detects_await_in_lock() {
    let bad_code = r#"
        async fn example() {
            let guard = state.write().await;
            some_async_call().await;
        }
    "#;

    let syntax: File = syn::parse_file(bad_code).unwrap();
    let mut visitor = AwaitInLockVisitor::default();
    visitor.visit_file(&syntax);
    assert_eq!(visitor.violations.len(), 1);
}

#[test]
fn allows_lock_released_before_await() {
    let good_code = r#"
        async fn example() {
            let data = {
                let guard = state.lock().unwrap_or_else(PoisonError::into_inner);
                guard.clone()
            };
            some_async_call().await;

            let guard = state.write().await;
            drop(guard);
            some_async_call().await;
        }
    "#;

    let syntax: File = syn::parse_file(good_code).unwrap();
    let mut visitor = AwaitInLockVisitor::default();
    visitor.visit_file(&syntax);
    assert!(visitor.violations.is_empty(), "{:?}", visitor.violations);
}

#[test]
fn no_await_in_lock_violations() {
    let mut violations = Vec::new();
    for path in source_files() {
        let Some(syntax) = parse(&path) else {
            continue;
        };
        let mut visitor = AwaitInLockVisitor::default();
        visitor.visit_file(&syntax);
        let file = relative(&path);
        violations.extend(visitor.violations.into_iter().map(|v| format!("{}: {}", file, v)));
    }

    assert!(
        violations.is_empty(),
        "\n\nFound .await while holding lock guard; release the lock first.\n{}\n",
        violations.join("\n")
    );
}

// =============================================================================
// unwrap / expect
// =============================================================================

#[derive(Default)]
struct UnwrapVisitor {
    violations: Vec<String>,
}

impl<'ast> Visit<'ast> for UnwrapVisitor {
    fn visit_item_mod(&mut self, item: &'ast ItemMod) {
        if !is_cfg_test(&item.attrs) {
            syn::visit::visit_item_mod(self, item);
        }
    }

    fn visit_item_fn(&mut self, item: &'ast ItemFn) {
        if !is_cfg_test(&item.attrs) {
            syn::visit::visit_item_fn(self, item);
        }
    }

    fn visit_expr_method_call(&mut self, call: &'ast ExprMethodCall) {
        if call.method == "unwrap" || call.method == "expect" {
            self.violations.push(format!(".{}()", call.method));
        }
        syn::visit::visit_expr_method_call(self, call);
    }
}

#[test]
fn detects_unwrap_outside_tests() {
    let code = r#"
        fn parse(s: &str) -> u16 {
            s.parse().unwrap()
        }

        #[cfg(test)]
        mod tests {
            #[test]
            fn parses() {
                assert_eq!(super::parse("1"), "1".parse::<u16>().expect("number"));
            }
        }
    "#;

    let syntax: File = syn::parse_file(code).unwrap();
    let mut visitor = UnwrapVisitor::default();
    visitor.visit_file(&syntax);
    assert_eq!(visitor.violations, vec![".unwrap()"]);
}

#[test]
fn no_unwrap_outside_tests() {
    let mut violations = Vec::new();
    for path in source_files() {
        let file = relative(&path);
        // Declared `#[cfg(test)]` by its parent
        if file.ends_with("/tests.rs") {
            continue;
        }
        let Some(syntax) = parse(&path) else {
            continue;
        };
        let mut visitor = UnwrapVisitor::default();
        visitor.visit_file(&syntax);
        violations.extend(visitor.violations.into_iter().map(|v| format!("{}: {}", file, v)));
    }

    assert!(
        violations.is_empty(),
        "\n\nPropagate errors instead of panicking.\n{}\n",
        violations.join("\n")
    );
}
