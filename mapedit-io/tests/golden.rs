use std::fs;
use std::path::PathBuf;

use mapedit_core::document::Document;
use serde_json::Value;

pub fn data_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(name)
}

/// 将导出结果与 `tests/data/golden/<name>.json` 按 JSON 值比较。
pub fn assert_golden(name: &str, exported: &str) {
    let base_dir = data_path("golden");
    if let Err(err) = fs::create_dir_all(&base_dir) {
        panic!("无法创建黄金数据目录 {}: {err}", base_dir.display());
    }
    let golden_path = base_dir.join(format!("{name}.json"));

    if !golden_path.exists() {
        fs::write(&golden_path, exported)
            .unwrap_or_else(|err| panic!("写入黄金文件 {} 失败: {err}", golden_path.display()));
        panic!(
            "黄金文件 {} 不存在，已自动生成。请确认内容后重新运行测试。",
            golden_path.display()
        );
    }

    let expected_str = fs::read_to_string(&golden_path)
        .unwrap_or_else(|err| panic!("读取黄金文件 {} 失败: {err}", golden_path.display()));
    let expected: Value = serde_json::from_str(&expected_str)
        .unwrap_or_else(|err| panic!("解析黄金文件 {} 失败: {err}", golden_path.display()));
    let actual: Value = serde_json::from_str(exported).expect("导出结果应为合法 JSON");

    if expected != actual {
        let diff_path = base_dir.join(format!("{name}.actual.json"));
        fs::write(&diff_path, exported).expect("写入差异文件失败");
        panic!(
            "黄金文件 {} 与当前导出结果不一致。已生成对照输出 {}。",
            golden_path.display(),
            diff_path.display()
        );
    }
}

/// 顶层与分类键序必须和输入一致。
pub fn assert_key_order(document: &Document, expected_root: &[&str], expected_categories: &[&str]) {
    let root: Vec<&str> = document.as_map().keys().map(String::as_str).collect();
    assert_eq!(root, expected_root, "顶层键序被打乱");
    let categories: Vec<&str> = document.categories().collect();
    assert_eq!(categories, expected_categories, "分类键序被打乱");
}
