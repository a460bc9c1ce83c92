use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use tempfile::TempDir;
use tidescript::interpreter::{self, Value};
use tidescript::modules::remote::{FetchedBody, Transport, TransportError};
use tidescript::modules::{ImportContext, ImportError, LocalResolver, Origin, RemoteResolver};

const DATA_APP_SOURCE: &str = "\
// Weighted total used by the driver examples.
fn main(a, b, c, d) {
    let base = a * b;
    let bias = c + d;
    return base + bias;
}
";

struct StubTransport {
    responses: HashMap<String, String>,
    requests: Rc<RefCell<Vec<String>>>,
}

impl StubTransport {
    fn new(responses: &[(&str, &str)]) -> (Self, Rc<RefCell<Vec<String>>>) {
        let requests = Rc::new(RefCell::new(Vec::new()));
        let transport = Self {
            responses: responses
                .iter()
                .map(|(url, body)| (url.to_string(), body.to_string()))
                .collect(),
            requests: requests.clone(),
        };
        (transport, requests)
    }
}

impl Transport for StubTransport {
    fn fetch(&self, url: &str) -> Result<FetchedBody, TransportError> {
        self.requests.borrow_mut().push(url.to_string());
        match self.responses.get(url) {
            Some(body) => Ok(FetchedBody {
                status: 200,
                body: body.clone(),
            }),
            None => Err(TransportError::Status {
                status: 404,
                reason: "Not Found".to_string(),
            }),
        }
    }
}

fn write_module(root: &Path, rel_path: &str, source: &str) {
    let path = root.join(rel_path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create module directory");
    }
    fs::write(path, source).expect("write module source");
}

fn local_context(root: &Path) -> ImportContext {
    let mut ctx = ImportContext::new();
    ctx.register(LocalResolver::with_roots(vec![root.to_path_buf()]));
    ctx
}

#[test]
fn imported_module_exports_a_callable_main() {
    let root = TempDir::new().expect("tempdir");
    write_module(root.path(), "data_app.tds", DATA_APP_SOURCE);
    let mut ctx = local_context(root.path());

    let handle = ctx.import("data_app", &[]).expect("import");
    let mut module = handle.borrow_mut();
    assert!(module.is_executed());
    assert!(matches!(
        module.namespace().get("main"),
        Some(Value::Function(_))
    ));

    let result = interpreter::call_function(
        module.namespace_mut(),
        "main",
        &[Value::Int(5), Value::Int(5), Value::Int(0), Value::Int(9)],
    )
    .expect("call main");
    assert_eq!(result, Value::Int(34));
}

#[test]
fn importing_twice_yields_the_same_module_object() {
    let root = TempDir::new().expect("tempdir");
    write_module(root.path(), "data_app.tds", DATA_APP_SOURCE);
    let mut ctx = local_context(root.path());

    let first = ctx.import("data_app", &[]).expect("first import");
    let second = ctx.import("data_app", &[]).expect("second import");
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(ctx.loaded_modules(), vec!["data_app".to_string()]);
}

#[test]
fn registering_the_same_resolver_twice_leaves_the_chain_unchanged() {
    let resolver = LocalResolver::with_roots(Vec::new());
    let mut ctx = ImportContext::new();
    ctx.register(resolver.clone());
    ctx.register(resolver);
    assert_eq!(ctx.resolver_count(), 1);

    // A distinct instance is a distinct identity and does append.
    ctx.register(LocalResolver::with_roots(Vec::new()));
    assert_eq!(ctx.resolver_count(), 2);
}

#[test]
fn executing_a_module_twice_fails_loudly() {
    let root = TempDir::new().expect("tempdir");
    write_module(root.path(), "data_app.tds", DATA_APP_SOURCE);
    let mut ctx = local_context(root.path());

    let name = tidescript::modules::ModuleName::from_dotted("data_app").expect("name");
    let unit = ctx.resolve_first(&name, &[]).expect("resolve");
    let handle = ctx.bind_module(&unit);
    ctx.execute_module(&handle, &unit).expect("first execution");

    let err = ctx
        .execute_module(&handle, &unit)
        .expect_err("second execution must be rejected");
    assert!(matches!(err, ImportError::AlreadyExecuted { .. }));
}

#[test]
fn module_retains_source_and_origin_metadata() {
    let root = TempDir::new().expect("tempdir");
    write_module(root.path(), "data_app.tds", DATA_APP_SOURCE);
    let mut ctx = local_context(root.path());

    let handle = ctx.import("data_app", &[]).expect("import");
    let module = handle.borrow();
    assert_eq!(module.source(), Some(DATA_APP_SOURCE));
    assert!(matches!(module.origin(), Some(Origin::File(_))));
    assert!(matches!(
        module.namespace().get("__origin__"),
        Some(Value::Str(_))
    ));
}

#[test]
fn unresolvable_name_surfaces_not_found() {
    let root = TempDir::new().expect("tempdir");
    let mut ctx = local_context(root.path());
    let err = ctx.import("absent", &[]).expect_err("must miss");
    assert!(matches!(err, ImportError::NotFound { .. }));
}

#[test]
fn empty_name_is_rejected_before_resolution() {
    let mut ctx = ImportContext::new();
    let err = ctx.import("", &[]).expect_err("must reject");
    assert!(matches!(err, ImportError::InvalidName { .. }));
}

#[test]
fn runtime_failure_during_execution_unbinds_the_name() {
    let root = TempDir::new().expect("tempdir");
    write_module(root.path(), "broken.tds", "let boom = 1 / 0;");
    let mut ctx = local_context(root.path());

    let err = ctx.import("broken", &[]).expect_err("must fail");
    assert!(matches!(err, ImportError::Runtime { .. }));
    assert!(ctx.loaded_modules().is_empty());
}

#[test]
fn remote_import_binds_url_origin_and_fetches_once() {
    let (transport, requests) = StubTransport::new(&[(
        "https://raw.example.test/owner/repo/main/data_app.tds",
        DATA_APP_SOURCE,
    )]);
    let mut ctx = ImportContext::new();
    ctx.register(LocalResolver::with_roots(Vec::new()));
    ctx.register(RemoteResolver::with_transport(
        "https://raw.example.test/owner/repo/main",
        Box::new(transport),
    ));
    assert_eq!(ctx.active_resolvers(), vec!["local", "remote"]);

    let handle = ctx.import("data_app", &[]).expect("import");
    {
        let module = handle.borrow();
        assert_eq!(
            module.origin(),
            Some(&Origin::Url(
                "https://raw.example.test/owner/repo/main/data_app.tds".to_string()
            ))
        );
    }

    // The second import is served from the registry: no further traffic.
    let again = ctx.import("data_app", &[]).expect("re-import");
    assert!(Rc::ptr_eq(&handle, &again));
    assert_eq!(requests.borrow().len(), 1);

    let mut module = handle.borrow_mut();
    let result = interpreter::call_function(
        module.namespace_mut(),
        "main",
        &[Value::Int(5), Value::Int(5), Value::Int(0), Value::Int(9)],
    )
    .expect("call main");
    assert_eq!(result, Value::Int(34));
}
