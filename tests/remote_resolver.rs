use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use tempfile::TempDir;
use tidescript::modules::name::ModuleName;
use tidescript::modules::remote::{FetchedBody, Transport, TransportError};
use tidescript::modules::{ImportContext, LocalResolver, Origin, RemoteResolver};

const BASE_URL: &str = "https://raw.example.test/owner/repo/main";

/// Scripted transport: known URLs answer 200 with a canned body, anything
/// else answers 404. Every request is recorded for assertions.
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

fn name(dotted: &str) -> ModuleName {
    ModuleName::from_dotted(dotted).expect("module name")
}

fn write_module(root: &Path, rel_path: &str, source: &str) {
    let path = root.join(rel_path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create module directory");
    }
    fs::write(path, source).expect("write module source");
}

#[test]
fn fetches_flat_file_and_records_origin_url() {
    let (transport, requests) = StubTransport::new(&[(
        "https://raw.example.test/owner/repo/main/data_app.tds",
        "fn main(a, b, c, d) { return a * b + c + d; }",
    )]);
    let resolver = RemoteResolver::with_transport(BASE_URL, Box::new(transport));
    let ctx = ImportContext::new();

    let unit = resolver
        .resolve(&ctx, &name("data_app"), &[])
        .expect("should resolve");

    assert!(!unit.is_package());
    assert_eq!(
        unit.origin(),
        &Origin::Url("https://raw.example.test/owner/repo/main/data_app.tds".to_string())
    );
    assert_eq!(requests.borrow().len(), 1);
}

#[test]
fn not_found_on_flat_url_still_probes_package_url() {
    let (transport, requests) = StubTransport::new(&[(
        "https://raw.example.test/owner/repo/main/pkg/mod.tds",
        "let version = 3;",
    )]);
    let resolver = RemoteResolver::with_transport(BASE_URL, Box::new(transport));
    let ctx = ImportContext::new();

    let unit = resolver
        .resolve(&ctx, &name("pkg"), &[])
        .expect("should resolve");

    assert!(unit.is_package());
    assert_eq!(
        *requests.borrow(),
        vec![
            "https://raw.example.test/owner/repo/main/pkg.tds".to_string(),
            "https://raw.example.test/owner/repo/main/pkg/mod.tds".to_string(),
        ]
    );
}

#[test]
fn invalid_body_on_success_status_is_a_miss_and_search_continues() {
    // A 200 answer carrying an HTML error page must not pass the syntax
    // gate, and the package URL must still be attempted afterwards.
    let (transport, requests) = StubTransport::new(&[(
        "https://raw.example.test/owner/repo/main/data_app.tds",
        "<html><body>not here</body></html>",
    )]);
    let resolver = RemoteResolver::with_transport(BASE_URL, Box::new(transport));
    let ctx = ImportContext::new();

    assert!(resolver.resolve(&ctx, &name("data_app"), &[]).is_none());
    assert_eq!(
        *requests.borrow(),
        vec![
            "https://raw.example.test/owner/repo/main/data_app.tds".to_string(),
            "https://raw.example.test/owner/repo/main/data_app/mod.tds".to_string(),
        ]
    );
}

#[test]
fn local_hit_suppresses_all_network_traffic() {
    let root = TempDir::new().expect("tempdir");
    write_module(root.path(), "data_app.tds", "fn main() { return 7; }");

    let (transport, requests) = StubTransport::new(&[(
        "https://raw.example.test/owner/repo/main/data_app.tds",
        "fn main() { return 0; }",
    )]);
    let resolver = RemoteResolver::with_transport(BASE_URL, Box::new(transport));
    let ctx = ImportContext::new();

    let unit = resolver
        .resolve(&ctx, &name("data_app"), &[root.path().to_path_buf()])
        .expect("should resolve");

    assert!(matches!(unit.origin(), Origin::File(_)));
    assert!(requests.borrow().is_empty());
}

#[test]
fn already_loaded_name_is_a_miss_without_any_fetch() {
    let root = TempDir::new().expect("tempdir");
    write_module(root.path(), "data_app.tds", "let ready = true;");

    let (transport, requests) = StubTransport::new(&[]);
    let mut ctx = ImportContext::new();
    ctx.register(RemoteResolver::with_transport(BASE_URL, Box::new(transport)));

    ctx.import("data_app", &[root.path().to_path_buf()])
        .expect("first import");
    assert!(requests.borrow().is_empty());

    let miss = ctx.resolve_first(&name("data_app"), &[root.path().to_path_buf()]);
    assert!(miss.is_none());
    assert!(requests.borrow().is_empty());
}

#[test]
fn delegation_is_skipped_when_a_local_resolver_is_in_the_chain() {
    // With a local resolver registered ahead of us the same roots were
    // already scanned; the remote resolver must go straight to the origin.
    let (transport, requests) = StubTransport::new(&[(
        "https://raw.example.test/owner/repo/main/missing.tds",
        "let found = 1;",
    )]);
    let mut ctx = ImportContext::new();
    ctx.register(LocalResolver::with_roots(Vec::new()));
    ctx.register(RemoteResolver::with_transport(BASE_URL, Box::new(transport)));

    let unit = ctx
        .resolve_first(&name("missing"), &[])
        .expect("remote should resolve");
    assert!(matches!(unit.origin(), Origin::Url(_)));
    assert_eq!(requests.borrow().len(), 1);
}

#[test]
fn total_miss_returns_none_after_both_conventions() {
    let (transport, requests) = StubTransport::new(&[]);
    let resolver = RemoteResolver::with_transport(BASE_URL, Box::new(transport));
    let ctx = ImportContext::new();

    assert!(resolver.resolve(&ctx, &name("ghost"), &[]).is_none());
    assert_eq!(requests.borrow().len(), 2);
}

#[test]
fn github_helper_builds_raw_content_origin() {
    let resolver = RemoteResolver::from_github("kenny", "flask-pandas-app", "main");
    assert_eq!(
        resolver.base_url(),
        "https://raw.githubusercontent.com/kenny/flask-pandas-app/main"
    );
}

#[test]
fn trailing_slashes_on_base_origin_are_trimmed() {
    let (transport, _requests) = StubTransport::new(&[]);
    let resolver =
        RemoteResolver::with_transport("https://raw.example.test/x/y/z///", Box::new(transport));
    assert_eq!(resolver.base_url(), "https://raw.example.test/x/y/z");
}
