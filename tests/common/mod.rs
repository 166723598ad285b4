#![allow(dead_code)]

use uppaal_mapper::{Diagnostic, MapperConfig, MapperRegistry, Orchestrator};

/// A small model using every built-in extension.
pub const MODEL: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE nta PUBLIC '-//Uppaal Team//DTD Flat System 1.1//EN' 'http://www.it.uu.se/research/group/darts/uppaal/flat-1_2.dtd'>
<nta>
  <declaration>const int N = 3;
int arr[N] = {0};
clock x;</declaration>
  <template>
    <name>Worker</name>
    <declaration>int buf[2] = {-1};</declaration>
    <location id="id0"><name>Idle</name><label kind="invariant">x &lt;= 5</label></location>
    <init ref="id0"/>
    <transition>
      <source ref="id0"/><target ref="id0"/>
      <label kind="guard">x &gt; 2</label>
    </transition>
  </template>
  <template>
    <name>__Clock</name>
    <location id="id1"/>
    <init ref="id1"/>
  </template>
  <system>system Worker, __Clock;</system>
  <queries>
    <query><formula>INVARIABLY x &gt;= 0</formula><comment>bounded</comment></query>
  </queries>
</nta>
"#;

/// [`MODEL`] as the built-in mappers rewrite it.
pub fn mapped_model() -> String {
    MODEL
        .replace("{0};", "{0, 0, 0};")
        .replace("{-1};", "{-1, -1};")
        .replace("INVARIABLY", "A[]")
}

pub fn builtins() -> Orchestrator {
    Orchestrator::from_config(&MapperConfig::default(), &MapperRegistry::with_builtins())
        .expect("built-in mappers resolve")
}

/// An engine diagnostic as it arrives on the wire.
pub fn engine_diagnostic(path: &str, line: usize, begin: usize, end: usize) -> Diagnostic {
    Diagnostic::from_wire(&format!(
        r#"{{"path":"{path}","begln":{line},"begcol":{begin},"endln":{line},"endcol":{end},"msg":"engine says no","ctx":""}}"#
    ))
    .expect("well-formed wire line")
}
