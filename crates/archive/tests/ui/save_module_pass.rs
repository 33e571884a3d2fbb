use std::collections::BTreeMap;
use yoki_archive::{Module, ModuleKey, save_module};

#[save_module(tag = "quest.log")]
pub struct QuestLog {
    pub active: Vec<u32>,
    pub notes: BTreeMap<u32, String>,
}

#[save_module]
pub enum Difficulty {
    Story,
    Hard { permadeath: bool },
}

#[save_module(tag = "generic.wrapper")]
pub struct Wrapper<T> {
    pub inner: T,
}

#[save_module(tag = "hand.derived")]
#[derive(yoki_archive::serde::Serialize, yoki_archive::serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "yoki_archive::serde")]
pub struct HandDerived {
    pub value: i64,
}

fn main() {
    assert_eq!(QuestLog::TAG, "quest.log");
    assert_eq!(QuestLog::KEY, ModuleKey::from_tag("quest.log"));
    assert_eq!(Difficulty::TAG, "Difficulty");
    assert_eq!(<Wrapper<u8> as Module>::TAG, "generic.wrapper");
    assert_eq!(HandDerived::TAG, "hand.derived");

    let log = QuestLog { active: vec![1], notes: BTreeMap::new() };
    assert_eq!(log.clone(), log);
    let _ = format!("{:?}", Difficulty::Hard { permadeath: true });
}
