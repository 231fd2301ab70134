//! End-to-end builds through the public API.

use doctool::pipeline::{BuildError, Generator, GeneratorOptions, Stage};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn copy_dir(src: &Path, dst: &Path) {
    for entry in fs::read_dir(src).unwrap() {
        let entry = entry.unwrap();
        let target = dst.join(entry.file_name());
        if entry.path().is_dir() {
            fs::create_dir_all(&target).unwrap();
            copy_dir(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), &target).unwrap();
        }
    }
}

fn fixture_site() -> TempDir {
    let tmp = TempDir::new().unwrap();
    copy_dir(&Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/content"), tmp.path());
    tmp
}

fn written(dir: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(dir)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    files
}

#[test]
fn fixture_site_builds_completely() {
    let tmp = fixture_site();
    let options = GeneratorOptions::new(tmp.path()).target(tmp.path());
    let summaries = Generator::collect(options).unwrap().run().unwrap();

    assert_eq!(summaries.len(), 1);
    let summary = &summaries[0];
    assert!(!summary.has_failures(), "{:?}", summary.write.failures);
    assert_eq!(summary.synthetic, 2);

    assert_eq!(
        written(&tmp.path().join("site")),
        vec![
            "advanced/tuning.html",
            "api/index.html",
            "api/types.html",
            "archive/tuning.html",
            "getting-started.html",
            "guide/advanced/index.html",
            "guide/index.html",
            "guide/install.html",
            "index.html",
        ]
    );
}

fn hrefs(html: &str) -> Vec<String> {
    let re = regex::Regex::new(r#"href="([^"]+)""#).unwrap();
    re.captures_iter(html).map(|c| c[1].replace("%20", " ")).collect()
}

#[test]
fn injected_index_links_resolve_to_written_files() {
    let tmp = fixture_site();
    let options = GeneratorOptions::new(tmp.path()).target(tmp.path());
    Generator::collect(options).unwrap().run().unwrap();

    let site = tmp.path().join("site");
    for index in ["index.html", "guide/advanced/index.html"] {
        let page = site.join(index);
        let links = hrefs(&fs::read_to_string(&page).unwrap());
        assert!(!links.is_empty(), "{index} has no links");
        for href in links {
            let target = page.parent().unwrap().join(&href);
            assert!(target.is_file(), "{index} links {href}, which was not written");
        }
    }
    let advanced = fs::read_to_string(site.join("guide/advanced/index.html")).unwrap();
    assert!(advanced.contains(r#"href="../../advanced/tuning.html""#));
}

#[test]
fn moved_document_is_linked_where_it_was_written() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("guide")).unwrap();
    fs::write(tmp.path().join("guide/tuning.md"), "destination_dirs: [elsewhere/]\n\n# Tuning").unwrap();
    let options = GeneratorOptions::new(tmp.path()).target(tmp.path());
    Generator::collect(options).unwrap().run().unwrap();

    let guide = fs::read_to_string(tmp.path().join("site/guide/index.html")).unwrap();
    assert!(guide.contains(r#"href="../elsewhere/tuning.html""#));
    assert!(tmp.path().join("site/elsewhere/tuning.html").is_file());
}

#[test]
fn destination_filename_cannot_escape_the_site() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("page.md"), "destination_filename: ../../escaped.html\n\nbody").unwrap();
    let options = GeneratorOptions::new(&docs).target(&docs);
    let summaries = Generator::collect(options).unwrap().run().unwrap();

    assert!(docs.join("site/escaped.html").is_file());
    assert!(!tmp.path().join("escaped.html").exists());
    assert!(summaries[0].write.written.iter().all(|p| p.starts_with(docs.join("site"))));
}

#[test]
fn odd_titles_and_filenames_still_link() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("guide")).unwrap();
    fs::write(
        tmp.path().join("guide/about.md"),
        "title: About [us] {{ team }}\ndestination_filename: About Us.htm\n\nbody",
    )
    .unwrap();
    let options = GeneratorOptions::new(tmp.path()).target(tmp.path());
    let summaries = Generator::collect(options).unwrap().run().unwrap();

    assert!(!summaries[0].has_failures(), "{:?}", summaries[0].render_failures);
    let guide = fs::read_to_string(tmp.path().join("site/guide/index.html")).unwrap();
    assert!(guide.contains(r#"href="About%20Us.htm""#));
    assert!(guide.contains("About [us] {{ team }}</a>"));
    assert!(tmp.path().join("site/guide/About Us.htm").is_file());
}

#[test]
fn body_variables_resolve_in_written_pages() {
    let tmp = fixture_site();
    let options = GeneratorOptions::new(tmp.path()).target(tmp.path());
    Generator::collect(options).unwrap().run().unwrap();

    let page = fs::read_to_string(tmp.path().join("site/getting-started.html")).unwrap();
    assert!(page.contains("<title>Getting Started</title>"));
    assert!(page.contains(">Getting Started</h1>"));
    assert!(!page.contains("{{"));

    let archived = fs::read_to_string(tmp.path().join("site/archive/tuning.html")).unwrap();
    let primary = fs::read_to_string(tmp.path().join("site/advanced/tuning.html")).unwrap();
    assert_eq!(archived, primary);
    assert!(primary.contains(">Tuning</h1>"));
}

#[test]
fn injected_root_index_lists_children() {
    let tmp = fixture_site();
    let options = GeneratorOptions::new(tmp.path()).target(tmp.path());
    Generator::collect(options).unwrap().run().unwrap();

    let index = fs::read_to_string(tmp.path().join("site/index.html")).unwrap();
    assert!(index.contains("<title>Fixture Docs</title>"));
    assert!(index.contains(r#"href="getting-started.html""#));
    assert!(index.contains(r#"href="guide/index.html""#));
    assert!(index.contains(r#"href="api/index.html""#));
}

#[test]
fn promoted_readme_becomes_directory_index() {
    let tmp = fixture_site();
    let options = GeneratorOptions::new(tmp.path()).target(tmp.path());
    Generator::collect(options).unwrap().run().unwrap();

    let guide = fs::read_to_string(tmp.path().join("site/guide/index.html")).unwrap();
    assert!(guide.contains("Start here."));
    assert!(!tmp.path().join("site/guide/readme.html").exists());
}

#[test]
fn output_dirs_override_fans_out() {
    let tmp = fixture_site();
    let options = GeneratorOptions::new(tmp.path())
        .target(tmp.path())
        .set(r#"output_dirs=["out/a", "out/b"]"#);
    Generator::collect(options).unwrap().run().unwrap();

    assert_eq!(
        written(&tmp.path().join("out/a")),
        written(&tmp.path().join("out/b"))
    );
    assert!(tmp.path().join("out/b/archive/tuning.html").exists());
    assert!(!tmp.path().join("site").exists());
}

#[test]
fn rebuilding_does_not_read_its_own_output() {
    let tmp = fixture_site();
    for _ in 0..2 {
        let options = GeneratorOptions::new(tmp.path()).target(tmp.path());
        let summaries = Generator::collect(options).unwrap().run().unwrap();
        assert_eq!(summaries[0].documents, 8);
    }
}

#[test]
fn two_targets_build_independently() {
    let tmp = TempDir::new().unwrap();
    for (name, body) in [("alpha", "# Alpha"), ("beta", "# Beta")] {
        let dir = tmp.path().join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("page.md"), body).unwrap();
    }
    let options = GeneratorOptions::new(tmp.path()).target("alpha").target("beta");
    let summaries = Generator::collect(options).unwrap().run().unwrap();

    assert_eq!(summaries.len(), 2);
    assert_eq!(
        written(&tmp.path().join("alpha/site")),
        vec!["index.html", "page.html"]
    );
    let beta = fs::read_to_string(tmp.path().join("beta/site/page.html")).unwrap();
    assert!(beta.contains(">Beta</h1>"));
}

#[test]
fn bad_config_fails_before_anything_is_written() {
    let tmp = fixture_site();
    fs::write(tmp.path().join("docs.yaml"), "base_utils: [nonexistent]\n").unwrap();
    let options = GeneratorOptions::new(tmp.path()).target(tmp.path());

    assert!(matches!(Generator::collect(options), Err(BuildError::Config(_))));
    assert!(!tmp.path().join("site").exists());
}

#[test]
fn stages_cannot_be_skipped() {
    let tmp = fixture_site();
    let options = GeneratorOptions::new(tmp.path()).target(tmp.path());
    let mut generator = Generator::collect(options).unwrap();

    assert!(matches!(
        generator.run_stage(Stage::PlugHoles),
        Err(BuildError::NotFinalized(Stage::PlugHoles))
    ));
    generator.run_through(Stage::BuildIndexes).unwrap();
    assert!(!tmp.path().join("site").exists());
}
