//! File, directory, and glob loading.

use std::fs;
use std::path::Path;

use anyhow::Result;
use tempfile::TempDir;
use tplkit::{Options, RenderError, Renderer};

fn write_file(dir: &Path, rel: &str, content: &str) -> Result<()> {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

fn render(r: &Renderer, name: &str, data: &str) -> Result<String> {
    let mut out = Vec::new();
    r.render_partial(&mut out, name, data)?;
    Ok(String::from_utf8(out)?)
}

#[test]
fn load_file_registers_under_the_given_name() -> Result<()> {
    let dir = TempDir::new()?;
    write_file(dir.path(), "greeting.tpl", "hello {{ data }}")?;

    let mut r = Renderer::inited(Options::new())?;
    r.load_file("greeting", dir.path().join("greeting.tpl"))?;

    assert_eq!(render(&r, "greeting", "file")?, "hello file");
    assert_eq!(
        r.fragment("greeting").unwrap().file(),
        Some(dir.path().join("greeting.tpl").as_path())
    );
    Ok(())
}

#[test]
fn load_file_missing_path_is_an_io_error() -> Result<()> {
    let dir = TempDir::new()?;
    let mut r = Renderer::inited(Options::new())?;
    let err = r
        .load_file("nope", dir.path().join("absent.tpl"))
        .unwrap_err();
    assert!(matches!(err, RenderError::File { .. }));
    Ok(())
}

#[test]
fn load_bytes_validates_utf8() -> Result<()> {
    let mut r = Renderer::inited(Options::new())?;
    r.load_bytes("page", b"hello {{ data }}")?;
    assert_eq!(render(&r, "page", "bytes")?, "hello bytes");

    let err = r.load_bytes("broken", &[0xff, 0xfe, b'x']).unwrap_err();
    assert!(matches!(err, RenderError::Utf8 { ref name, .. } if name == "broken"));
    assert!(!r.contains("broken"));
    Ok(())
}

#[test]
fn load_files_skips_unrecognized_extensions() -> Result<()> {
    let dir = TempDir::new()?;
    write_file(dir.path(), "a.tpl", "A")?;
    write_file(dir.path(), "b.txt", "B")?;

    let mut r = Renderer::inited(Options::new())?;
    r.load_files([dir.path().join("a.tpl"), dir.path().join("b.txt")])?;

    // names derive from the full path, extension stripped
    let names = r.names();
    assert_eq!(names.len(), 1);
    assert!(names[0].ends_with("/a"));
    Ok(())
}

#[test]
fn load_dir_names_by_relative_path_without_extension() -> Result<()> {
    let dir = TempDir::new()?;
    write_file(dir.path(), "home.tpl", "home {{ data }}")?;
    write_file(dir.path(), "admin/footer.html", "foot")?;
    write_file(dir.path(), "notes.txt", "skip me")?;

    let mut r = Renderer::inited(Options::new())?;
    r.load_dir(dir.path())?;

    assert_eq!(r.names(), ["admin/footer", "home"]);
    assert_eq!(render(&r, "home", "x")?, "home x");
    assert_eq!(render(&r, "admin/footer", "")?, "foot");
    // lookups accept the raw form too
    assert_eq!(render(&r, "admin/footer.html", "")?, "foot");
    Ok(())
}

#[test]
fn load_dir_resolves_extends_regardless_of_walk_order() -> Result<()> {
    let dir = TempDir::new()?;
    // child sorts before its base alphabetically
    write_file(
        dir.path(),
        "a_child.tpl",
        "{{ extends \"z_base\" }}\n{% block body %}child{% endblock %}",
    )?;
    write_file(
        dir.path(),
        "z_base.tpl",
        "B[{% block body %}base{% endblock %}]",
    )?;

    let mut r = Renderer::inited(Options::new())?;
    r.load_dir(dir.path())?;

    assert_eq!(render(&r, "a_child", "")?, "B[child]");
    assert_eq!(render(&r, "z_base", "")?, "B[base]");
    Ok(())
}

#[test]
fn views_dirs_are_loaded_at_init() -> Result<()> {
    let dir = TempDir::new()?;
    write_file(dir.path(), "layout.tpl", "L({{ yield() }})")?;
    write_file(dir.path(), "pages/home.tpl", "home {{ data }}")?;

    let r = Renderer::inited(
        Options::new()
            .with_views_dir(dir.path())
            .with_layout("layout"),
    )?;

    let mut out = Vec::new();
    r.render(&mut out, "pages/home", "v")?;
    assert_eq!(out, b"L(home v)");
    Ok(())
}

#[test]
fn extends_may_cross_views_dirs() -> Result<()> {
    let one = TempDir::new()?;
    let two = TempDir::new()?;
    // the child lives in the first directory walked, its base in the second
    write_file(
        one.path(),
        "child.tpl",
        "{{ extends \"base\" }}\n{% block body %}c{% endblock %}",
    )?;
    write_file(two.path(), "base.tpl", "[{% block body %}b{% endblock %}]")?;

    let r = Renderer::inited(
        Options::new()
            .with_views_dir(one.path())
            .with_views_dir(two.path()),
    )?;

    assert_eq!(render(&r, "child", "")?, "[c]");
    Ok(())
}

#[test]
fn load_glob_from_strips_the_base_directory() -> Result<()> {
    let dir = TempDir::new()?;
    write_file(dir.path(), "site/home.tpl", "home")?;
    write_file(dir.path(), "site/about.tpl", "about")?;
    write_file(dir.path(), "site/raw.txt", "skip")?;

    let mut r = Renderer::inited(Options::new())?;
    let pattern = format!("{}/site/*.tpl", dir.path().display());
    r.load_glob_from(&pattern, dir.path())?;

    assert_eq!(r.names(), ["site/about", "site/home"]);
    assert_eq!(render(&r, "site/home", "")?, "home");
    Ok(())
}

#[test]
fn load_glob_rejects_malformed_patterns() -> Result<()> {
    let mut r = Renderer::inited(Options::new())?;
    let err = r.load_glob("views/a**[").unwrap_err();
    assert!(matches!(err, RenderError::Pattern { .. }));
    Ok(())
}

#[test]
fn files_maps_names_to_paths() -> Result<()> {
    let dir = TempDir::new()?;
    write_file(dir.path(), "a.tpl", "A")?;

    let mut r = Renderer::inited(Options::new())?;
    r.load_dir(dir.path())?;
    r.load_string("inline", "B")?;

    let files = r.files();
    assert_eq!(files.len(), 1);
    assert_eq!(files["a"], dir.path().join("a.tpl"));
    Ok(())
}
