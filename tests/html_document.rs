use md2pdf::infra::render::DocumentBuilder;

const MARKDOWN: &str = "# Title\n\nHello *world* and ~~gone~~.\n\n- one\n- two\n\n> quoted\n";

fn article_body(html: &str) -> &str {
    let start = html
        .find("<article class=\"markdown-body\">")
        .expect("article start")
        + "<article class=\"markdown-body\">".len();
    let end = html.rfind("</article>").expect("article end");
    html[start..end].trim()
}

#[test]
fn gfm_body_snapshot() {
    let builder = DocumentBuilder::new("Noto Sans CJK SC", None).expect("builder");
    let html = builder.build(MARKDOWN).expect("document");

    insta::assert_snapshot!("gfm_body", article_body(&html));
}

#[test]
fn document_shell_is_complete() {
    let builder =
        DocumentBuilder::new("Source Han Serif", Some(".markdown-body { color: #111; }"))
            .expect("builder");
    let html = builder.build(MARKDOWN).expect("document");

    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("<meta charset=\"utf-8\">"));
    assert!(html.contains("<title>Title</title>"));
    assert!(html.contains("font-family: 'Source Han Serif', sans-serif;"));
    assert!(html.contains("@page"));
    assert!(html.contains(".markdown-body { color: #111; }"));
}

#[test]
fn cjk_text_passes_through_unchanged() {
    let builder = DocumentBuilder::new("Noto Sans CJK SC", None).expect("builder");
    let html = builder
        .build("# 季度报告\n\n这是**重要**的内容。\n")
        .expect("document");

    assert!(html.contains("<title>季度报告</title>"));
    assert!(html.contains("这是<strong>重要</strong>的内容。"));
}
