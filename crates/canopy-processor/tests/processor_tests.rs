use canopy_core::{
    AnalysisResult, Analyzer, AnalyzerCapability, AnalyzerRegistry, CancellationToken, Error,
    NormalizeOptions, SourceLocation, TextSpan,
};
use canopy_fs::MemoryFileSystem;
use canopy_processor::{InputKind, Processor, ProcessorOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const SDK_PROJECT: &str = r#"<Project Sdk="Microsoft.NET.Sdk"></Project>"#;

/// Analyzer that records how many parses run at once. Sources containing
/// `CORRUPT` fail to parse.
#[derive(Debug)]
struct InstrumentedAnalyzer {
    capability: AnalyzerCapability,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl InstrumentedAnalyzer {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            capability: AnalyzerCapability::new("mock", [".cs"], [".csproj"]),
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        })
    }

    fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Analyzer for InstrumentedAnalyzer {
    fn capability(&self) -> &AnalyzerCapability {
        &self.capability
    }

    fn analyze(
        &self,
        source: &str,
        path: &Path,
        _options: &NormalizeOptions,
    ) -> canopy_core::Result<AnalysisResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if source.contains("CORRUPT") {
            return Err(Error::Parse {
                path: path.to_path_buf(),
                message: "unexpected token".to_string(),
            });
        }
        let mut root = AnalysisResult::new("Document", "document");
        root.source_text = source.to_string();
        root.span = TextSpan::new(0, source.len());
        root.location = SourceLocation::for_path(path);
        Ok(root)
    }
}

fn registry_with(analyzer: &Arc<InstrumentedAnalyzer>) -> Arc<AnalyzerRegistry> {
    let analyzer: Arc<dyn Analyzer> = analyzer.clone();
    Arc::new(AnalyzerRegistry::new(vec![analyzer]))
}

fn processor(
    fs: MemoryFileSystem,
    analyzer: &Arc<InstrumentedAnalyzer>,
    max_concurrency: usize,
) -> Processor<MemoryFileSystem> {
    Processor::new(
        Arc::new(fs),
        registry_with(analyzer),
        ProcessorOptions::default().with_max_concurrency(max_concurrency),
    )
}

/// SDK-style project with `count` files of varying size.
fn project_fs(count: usize) -> MemoryFileSystem {
    let fs = MemoryFileSystem::new("/repo").with_file("/repo/App/App.csproj", SDK_PROJECT);
    for i in 0..count {
        fs.add_file(
            format!("/repo/App/F{:02}.cs", i),
            format!("class F{} {{ {} }}", i, "x".repeat((i * 37) % 300)),
        );
    }
    fs
}

fn child_paths(root: &AnalysisResult) -> Vec<String> {
    root.children
        .iter()
        .map(|child| child.location.path.clone())
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_project_output_is_deterministic() {
    let mut reference: Option<String> = None;
    for max_concurrency in [1, 4, 16] {
        for _ in 0..3 {
            let analyzer = InstrumentedAnalyzer::new(Duration::from_millis(1));
            let processor = processor(project_fs(24), &analyzer, max_concurrency);
            let envelope = processor
                .process_project(Path::new("/repo/App/App.csproj"))
                .await
                .unwrap();

            let paths = child_paths(&envelope.root_node);
            let mut sorted = paths.clone();
            sorted.sort();
            assert_eq!(paths, sorted);
            assert_eq!(paths.len(), 24);

            let json = serde_json::to_string(&envelope.root_node).unwrap();
            match &reference {
                Some(expected) => assert_eq!(&json, expected, "concurrency {}", max_concurrency),
                None => reference = Some(json),
            }
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_bound_is_respected() {
    let analyzer = InstrumentedAnalyzer::new(Duration::from_millis(15));
    let processor = processor(project_fs(16), &analyzer, 3);
    processor
        .process_project(Path::new("/repo/App/App.csproj"))
        .await
        .unwrap();

    assert_eq!(analyzer.calls.load(Ordering::SeqCst), 16);
    assert!(analyzer.max_in_flight() <= 3, "saw {}", analyzer.max_in_flight());
    assert!(analyzer.max_in_flight() >= 1);
}

const SOLUTION: &str = r#"
Microsoft Visual Studio Solution File, Format Version 12.00
# Visual Studio Version 17
VisualStudioVersion = 17.0.31903.59
MinimumVisualStudioVersion = 10.0.40219.1
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "Web", "Web\Web.csproj", "{22222222-2222-2222-2222-222222222222}"
EndProject
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "Core", "Core\Core.csproj", "{11111111-1111-1111-1111-111111111111}"
EndProject
Project("{8BC9CEB8-8B4A-11D0-8D11-00A0C91BC942}") = "Native", "Native\Native.unknownproj", "{33333333-3333-3333-3333-333333333333}"
EndProject
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "Gone", "Gone\Gone.csproj", "{44444444-4444-4444-4444-444444444444}"
EndProject
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") "Broken"
"#;

fn solution_fs() -> MemoryFileSystem {
    let fs = MemoryFileSystem::new("/sln")
        .with_file("/sln/All.sln", SOLUTION)
        .with_file("/sln/Web/Web.csproj", SDK_PROJECT)
        .with_file("/sln/Core/Core.csproj", SDK_PROJECT)
        .with_file("/sln/Native/Native.unknownproj", "<Project />");
    for i in 0..8 {
        fs.add_file(format!("/sln/Web/W{}.cs", i), "class W {}");
        fs.add_file(format!("/sln/Core/C{}.cs", i), "class C {}");
    }
    fs.add_file("/sln/Core/Bad.cs", "CORRUPT");
    fs
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_solution_is_sorted_and_bounded() {
    let analyzer = InstrumentedAnalyzer::new(Duration::from_millis(5));
    let processor = processor(solution_fs(), &analyzer, 2);
    let envelope = processor
        .process_solution(Path::new("/sln/All.sln"))
        .await
        .unwrap();
    let root = &envelope.root_node;

    assert_eq!(root.type_tag, "Solution");
    assert_eq!(root.kind_tag, "SolutionManifest");
    assert_eq!(
        child_paths(root),
        vec!["/sln/Core/Core.csproj", "/sln/Web/Web.csproj"]
    );
    assert_eq!(root.attributes["formatVersion"], "12.00");
    assert_eq!(root.attributes["toolVersion"], "17.0.31903.59");
    assert_eq!(root.attributes["unsupportedProjects"][0], "/sln/Native/Native.unknownproj");
    assert_eq!(root.attributes["missingProjects"][0], "/sln/Gone/Gone.csproj");
    assert_eq!(root.attributes["errorCount"], 1);

    let core = &root.children[0];
    assert_eq!(core.type_tag, "Project");
    assert_eq!(core.children.len(), 9);
    assert_eq!(core.attributes["errorCount"], 1);

    // one limiter for every project in the solution
    assert!(analyzer.max_in_flight() <= 2, "saw {}", analyzer.max_in_flight());
    assert_eq!(analyzer.calls.load(Ordering::SeqCst), 17);
}

#[tokio::test]
async fn test_unreadable_solution_is_fatal() {
    let analyzer = InstrumentedAnalyzer::new(Duration::ZERO);
    let processor = processor(MemoryFileSystem::new("/sln"), &analyzer, 4);
    let err = processor
        .process_solution(Path::new("/sln/Missing.sln"))
        .await
        .unwrap_err();
    assert!(matches!(err, canopy_processor::Error::Solution { .. }));
    assert!(!err.is_cancelled());
}

#[tokio::test]
async fn test_one_corrupt_file_is_isolated() {
    let fs = project_fs(9);
    fs.add_file("/repo/App/Corrupt.cs", "CORRUPT");
    let analyzer = InstrumentedAnalyzer::new(Duration::ZERO);
    let processor = processor(fs, &analyzer, 4);

    let envelope = processor
        .process_project(Path::new("/repo/App/App.csproj"))
        .await
        .unwrap();
    let root = &envelope.root_node;

    assert_eq!(root.children.len(), 10);
    let errors = root.error_nodes();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].attribute_str("errorKind"), Some("ParseFailure"));
    assert_eq!(errors[0].attribute_str("path"), Some("/repo/App/Corrupt.cs"));
    assert!(errors[0].source_text.contains("unexpected token"));
    assert_eq!(root.children.iter().filter(|c| !c.is_error()).count(), 9);
    assert!(envelope.has_errors());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_generated_deep_expression_is_isolated() {
    let mut generated = String::from("class Table { int Sum() { return 1");
    for _ in 1..20_000 {
        generated.push_str(" + 1");
    }
    generated.push_str("; } }");

    let fs = MemoryFileSystem::new("/repo")
        .with_file("/repo/App/App.csproj", SDK_PROJECT)
        .with_file("/repo/App/Generated.cs", generated)
        .with_file("/repo/App/Program.cs", "class Program { static void Main() {} }");
    let processor = Processor::new(
        Arc::new(fs),
        canopy_backend_csharp::default_registry(),
        ProcessorOptions::default(),
    );

    let envelope = processor
        .process_project(Path::new("/repo/App/App.csproj"))
        .await
        .unwrap();
    let root = &envelope.root_node;

    assert_eq!(root.children.len(), 2);
    let errors = root.error_nodes();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].attribute_str("errorKind"), Some("ParseFailure"));
    assert_eq!(errors[0].attribute_str("path"), Some("/repo/App/Generated.cs"));
    assert!(root
        .children
        .iter()
        .any(|c| c.kind_tag == "compilation_unit" && c.location.path == "/repo/App/Program.cs"));
}

#[tokio::test]
async fn test_missing_project_manifest_yields_error_envelope() {
    let analyzer = InstrumentedAnalyzer::new(Duration::ZERO);
    let processor = processor(MemoryFileSystem::new("/repo"), &analyzer, 4);
    let envelope = processor
        .process_project(Path::new("/repo/Nope/Nope.csproj"))
        .await
        .unwrap();
    assert!(envelope.root_node.is_error());
    assert_eq!(
        envelope.root_node.attribute_str("errorKind"),
        Some("ManifestFailure")
    );
}

#[tokio::test]
async fn test_process_file_is_idempotent() {
    let analyzer = InstrumentedAnalyzer::new(Duration::ZERO);
    let processor = processor(project_fs(2), &analyzer, 2);
    let path = Path::new("/repo/App/F01.cs");

    let first = processor.process_file(path).await.unwrap().unwrap();
    let second = processor.process_file(path).await.unwrap().unwrap();
    assert!(first.structurally_eq(&second));
    assert_eq!(first.source_identifier, "/repo/App/F01.cs");
}

#[tokio::test]
async fn test_process_file_without_result() {
    let fs = project_fs(1).with_file("/repo/App/notes.txt", "hello");
    let analyzer = InstrumentedAnalyzer::new(Duration::ZERO);
    let processor = processor(fs, &analyzer, 2);

    assert!(processor
        .process_file(Path::new("/repo/App/Missing.cs"))
        .await
        .unwrap()
        .is_none());
    assert!(processor
        .process_file(Path::new("/repo/App/notes.txt"))
        .await
        .unwrap()
        .is_none());
    assert_eq!(analyzer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalid_utf8_is_a_parse_failure() {
    let fs = project_fs(1).with_file("/repo/App/Latin1.cs", vec![0x63, 0xe9, 0xff]);
    let analyzer = InstrumentedAnalyzer::new(Duration::ZERO);
    let processor = processor(fs, &analyzer, 2);

    let err = processor
        .process_file(Path::new("/repo/App/Latin1.cs"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not valid UTF-8"));

    let envelope = processor
        .process_project(Path::new("/repo/App/App.csproj"))
        .await
        .unwrap();
    let errors = envelope.root_node.error_nodes();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].attribute_str("errorKind"), Some("ParseFailure"));
}

#[tokio::test]
async fn test_batch_emits_placeholder_per_failure_in_input_order() {
    let fs = project_fs(2)
        .with_file("/repo/App/Bad.cs", "CORRUPT")
        .with_file("/repo/readme.txt", "hi");
    let analyzer = InstrumentedAnalyzer::new(Duration::ZERO);
    let processor = processor(fs, &analyzer, 2);

    let inputs = vec![
        PathBuf::from("/repo/App/F01.cs"),
        PathBuf::from("/repo/App/Missing.cs"),
        PathBuf::from("/repo/App/Bad.cs"),
        PathBuf::from("/repo/readme.txt"),
        PathBuf::from("/repo/App/F00.cs"),
    ];
    let envelopes = processor.process_multiple_files(&inputs).await.unwrap();

    assert_eq!(envelopes.len(), inputs.len());
    let identifiers: Vec<_> = envelopes.iter().map(|e| e.source_identifier.as_str()).collect();
    assert_eq!(
        identifiers,
        vec![
            "/repo/App/F01.cs",
            "/repo/App/Missing.cs",
            "/repo/App/Bad.cs",
            "/repo/readme.txt",
            "/repo/App/F00.cs"
        ]
    );
    let kinds: Vec<_> = envelopes
        .iter()
        .map(|e| e.root_node.attribute_str("errorKind"))
        .collect();
    assert_eq!(
        kinds,
        vec![
            None,
            Some("MissingFile"),
            Some("ParseFailure"),
            Some("NoAnalyzer"),
            None
        ]
    );
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let analyzer = InstrumentedAnalyzer::new(Duration::ZERO);
    let token = CancellationToken::new();
    let processor = processor(project_fs(4), &analyzer, 2).with_cancellation(token.clone());
    token.cancel();

    let err = processor
        .process_project(Path::new("/repo/App/App.csproj"))
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    let err = processor
        .process_multiple_files(&[PathBuf::from("/repo/App/F00.cs")])
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(analyzer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancellation_aborts_in_flight_project() {
    let analyzer = InstrumentedAnalyzer::new(Duration::from_millis(25));
    let processor = processor(project_fs(40), &analyzer, 2);
    let token = processor.cancellation_token().clone();

    let handle = tokio::spawn({
        let processor = processor.clone();
        async move {
            processor
                .process_project(Path::new("/repo/App/App.csproj"))
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(40)).await;
    token.cancel();

    let err = handle.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    assert!(analyzer.calls.load(Ordering::SeqCst) < 40);
}

#[tokio::test]
async fn test_classification_and_dispatch() {
    let fs = solution_fs().with_file("/sln/README.md", "# hi");
    let analyzer = InstrumentedAnalyzer::new(Duration::ZERO);
    let processor = processor(fs, &analyzer, 4);

    assert_eq!(
        processor.classify(Path::new("/sln/All.sln")).await.unwrap(),
        InputKind::Solution
    );
    let err = processor
        .process_path(Path::new("/sln/README.md"))
        .await
        .unwrap_err();
    assert!(err.is_classification());

    let file = processor.process_path(Path::new("/sln/Core/C1.cs")).await.unwrap();
    assert_eq!(file.root_node.type_tag, "Document");

    let bad = processor.process_path(Path::new("/sln/Core/Bad.cs")).await.unwrap();
    assert!(bad.root_node.is_error());

    let missing = processor
        .process_path(Path::new("/sln/Core/Gone.cs"))
        .await
        .unwrap_err();
    assert!(matches!(
        missing,
        canopy_processor::Error::Core(Error::MissingFile { .. })
    ));
}

#[tokio::test]
async fn test_directory_scan() {
    let fs = solution_fs().with_file("/sln/Web/obj/Generated.cs", "class G {}");
    let analyzer = InstrumentedAnalyzer::new(Duration::ZERO);
    let processor = processor(fs, &analyzer, 4);

    let envelope = processor.process_path(Path::new("/sln/Web")).await.unwrap();
    let root = &envelope.root_node;
    assert_eq!(root.type_tag, "Directory");
    assert_eq!(root.kind_tag, "DirectoryScan");
    assert_eq!(root.attributes["sourceFileCount"], 8);
    assert!(child_paths(root).iter().all(|p| !p.contains("/obj/")));
}

#[tokio::test]
async fn test_batch_of_paths() {
    let analyzer = InstrumentedAnalyzer::new(Duration::ZERO);
    let processor = processor(solution_fs(), &analyzer, 4);
    let envelope = processor
        .process_paths(&[
            PathBuf::from("/sln/Web/Web.csproj"),
            PathBuf::from("/sln/Core/C0.cs"),
        ])
        .await
        .unwrap();
    let root = &envelope.root_node;
    assert_eq!(root.type_tag, "Batch");
    assert_eq!(root.children[0].type_tag, "Project");
    assert_eq!(root.children[1].type_tag, "Document");
}
