use serde::{Deserialize, Serialize};

use crate::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Layer {
    name: String,
    layer: i16,
    datatype: i16,
}
impl SerdeFile for Layer {}

fn metal1() -> Layer {
    Layer {
        name: "met1".into(),
        layer: 68,
        datatype: 20,
    }
}

#[test]
fn infers_formats() {
    use SerializationFormat::*;
    assert_eq!(SerializationFormat::from_path("a/b.json"), Some(Json));
    assert_eq!(SerializationFormat::from_path("b.YML"), Some(Yaml));
    assert_eq!(SerializationFormat::from_path("b.yaml"), Some(Yaml));
    assert_eq!(SerializationFormat::from_path("b.toml"), Some(Toml));
    assert_eq!(SerializationFormat::from_path("b.gds"), None);
    assert_eq!(SerializationFormat::from_path("noext"), None);
}

#[test]
fn parses_indented_yaml() -> Result<(), Error> {
    let s = "
        name: met1
        layer: 68
        datatype: 20
    ";
    let layer: Layer = SerializationFormat::Yaml.from_str(s)?;
    assert_eq!(layer, metal1());
    Ok(())
}

#[test]
fn file_round_trips() -> Result<(), Error> {
    let dir = tempfile::tempdir()?;
    for fname in ["layer.json", "layer.yaml", "layer.toml"] {
        let path = dir.path().join(fname);
        metal1().save_as(&path)?;
        let fmt = SerializationFormat::from_path(&path).unwrap();
        let back = Layer::open(&path, fmt)?;
        assert_eq!(back, metal1());
    }
    Ok(())
}

#[test]
fn rejects_unknown_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("layer.txt");
    assert!(metal1().save_as(&path).is_err());
    assert!(!path.exists());
}

struct Counter(usize);
impl ErrorHelper for Counter {
    type Error = String;
    fn err(&self, msg: impl Into<String>) -> String {
        format!("{} @{}", msg.into(), self.0)
    }
}

#[test]
fn error_helper_reports_state() {
    let c = Counter(7);
    assert_eq!(c.unwrap(Some(1), "x"), Ok(1));
    assert_eq!(c.assert(false, "bad"), Err("bad @7".to_string()));
    let r: Result<u8, ()> = Err(());
    assert_eq!(r.unwrapper(&c, "nope"), Err("nope @7".to_string()));
}
