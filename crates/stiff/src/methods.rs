//! Named filter compositions and their precedence tree.
//!
//! Each method extends its parent with stricter stages. The tree is only
//! used for documentation output; running a method never consults it.

use std::fmt::Write as _;

use serde::Serialize;

use crate::error::{Result, StiffError};

#[derive(Clone, Debug, Serialize)]
pub struct Method {
    pub code: &'static str,
    pub name: &'static str,
    pub parent: Option<&'static str>,
    pub stages: &'static [&'static str],
}

impl Method {
    pub fn ends_unambiguous(&self) -> bool {
        self.stages.last() == Some(&"rm-ambg")
    }
}

pub static METHODS: &[Method] = &[
    Method {
        code: "N",
        name: "null",
        parent: None,
        stages: &[],
    },
    Method {
        code: "MR",
        name: "mono-recall",
        parent: Some("N"),
        stages: &["lang fi", "tok-span", "freq dom", "rm-ambg"],
    },
    Method {
        code: "MP1",
        name: "mono-precision-1",
        parent: Some("MR"),
        stages: &["lang fi", "tok-span", "naive-pos rm=-1", "freq dom", "rm-ambg"],
    },
    Method {
        code: "MP2",
        name: "mono-precision-2",
        parent: Some("MP1"),
        stages: &[
            "lang fi",
            "tok-span",
            "naive-pos rm=-1",
            "naive-lemma dom",
            "lemma-path dom",
            "freq dom",
            "rm-ambg",
        ],
    },
    Method {
        code: "BR",
        name: "bilingual-recall",
        parent: Some("N"),
        stages: &["lang fi", "has-support dom", "tok-span", "freq dom", "rm-ambg"],
    },
    Method {
        code: "BP1",
        name: "bilingual-precision-1",
        parent: Some("BR"),
        stages: &["lang fi", "has-support rm=0", "tok-span", "freq dom", "rm-ambg"],
    },
    Method {
        code: "BP2",
        name: "bilingual-precision-2",
        parent: Some("BP1"),
        stages: &[
            "lang fi",
            "has-support rm=0",
            "align dom",
            "tok-span",
            "freq dom",
            "rm-ambg",
        ],
    },
    Method {
        code: "BP3",
        name: "bilingual-precision-3",
        parent: Some("BP2"),
        stages: &[
            "lang fi",
            "has-support rm=0",
            "align dom",
            "non-deriv dom",
            "tok-span",
            "freq dom",
            "rm-ambg",
        ],
    },
    Method {
        code: "BP4",
        name: "bilingual-precision-4",
        parent: Some("BP3"),
        stages: &[
            "lang fi",
            "has-support rm=0",
            "align dom",
            "non-deriv dom",
            "prefer-non-wiki-target dom",
            "prefer-non-wiki-source dom",
            "tok-span",
            "freq dom",
            "rm-ambg",
        ],
    },
    Method {
        code: "BP5",
        name: "bilingual-precision-5",
        parent: Some("BP4"),
        stages: &[
            "lang fi",
            "has-support rm=0",
            "align dom",
            "non-deriv dom",
            "prefer-non-wiki-target dom",
            "prefer-non-wiki-source dom",
            "naive-pos rm=-1",
            "lemma-path dom",
            "src-char-span",
            "src-char-len dom",
            "cond align 1 : hyp",
            "tok-span",
            "freq dom",
            "rm-ambg",
        ],
    },
    Method {
        code: "EC",
        name: "eurosense-coverage",
        parent: Some("N"),
        stages: &["lang fi", "char-span", "rm-ambg"],
    },
    Method {
        code: "EP",
        name: "eurosense-precision",
        parent: Some("EC"),
        stages: &[
            "lang fi",
            "prefer-non-wiki-target dom",
            "char-span",
            "alphabetic",
            "rm-ambg",
        ],
    },
];

/// Look a method up by short code or long name.
pub fn lookup(name: &str) -> Result<&'static Method> {
    METHODS
        .iter()
        .find(|m| m.code == name || m.name == name)
        .ok_or_else(|| StiffError::UnknownMethod(name.to_string()))
}

pub fn children(code: &str) -> impl Iterator<Item = &'static Method> + '_ {
    METHODS.iter().filter(move |m| m.parent == Some(code))
}

/// Root, leaves and branching nodes: the methods worth reporting results for.
pub fn critical_nodes() -> Vec<&'static Method> {
    METHODS
        .iter()
        .filter(|m| m.parent.is_none() || children(m.code).count() != 1)
        .collect()
}

fn is_critical(code: &str) -> bool {
    critical_nodes().iter().any(|m| m.code == code)
}

/// Indented text rendering of the tree.
pub fn render_tree() -> String {
    fn walk(out: &mut String, method: &Method, depth: usize) {
        let _ = writeln!(
            out,
            "{}{} ({}){}",
            "  ".repeat(depth),
            method.code,
            method.name,
            if is_critical(method.code) { " *" } else { "" }
        );
        for child in children(method.code) {
            walk(out, child, depth + 1);
        }
    }
    let mut out = String::new();
    for root in METHODS.iter().filter(|m| m.parent.is_none()) {
        walk(&mut out, root, 0);
    }
    out
}

/// LaTeX `forest` rendering; critical nodes are set in bold.
pub fn render_latex() -> String {
    fn walk(out: &mut String, method: &Method) {
        if is_critical(method.code) {
            let _ = write!(out, "[\\textbf{{{}}}", method.code);
        } else {
            let _ = write!(out, "[{}", method.code);
        }
        for child in children(method.code) {
            out.push(' ');
            walk(out, child);
        }
        out.push(']');
    }
    let mut out = String::from("\\begin{forest}\n");
    for root in METHODS.iter().filter(|m| m.parent.is_none()) {
        walk(&mut out, root);
        out.push('\n');
    }
    out.push_str("\\end{forest}\n");
    out
}

/// Graphviz rendering; critical nodes are drawn bold.
pub fn render_dot() -> String {
    let mut out = String::from("digraph methods {\n  node [shape=box];\n");
    for method in METHODS {
        let style = if is_critical(method.code) {
            ", style=bold"
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "  \"{}\" [label=\"{}\\n{}\"{}];",
            method.code, method.code, method.name, style
        );
    }
    for method in METHODS {
        if let Some(parent) = method.parent {
            let _ = writeln!(out, "  \"{}\" -> \"{}\";", parent, method.code);
        }
    }
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterResources, build_filter};
    use crate::wordnets::Wordnets;
    use std::sync::Arc;

    #[test]
    fn every_stage_builds() {
        let wordnets = Wordnets::from_parts(
            Vec::new(),
            Vec::new(),
            None,
            Default::default(),
            Default::default(),
        );
        let res = FilterResources {
            wordnets: Some(Arc::new(wordnets)),
        };
        for method in METHODS {
            for stage in method.stages {
                build_filter(stage, &res)
                    .unwrap_or_else(|err| panic!("{} stage {stage:?}: {err}", method.code));
            }
        }
    }

    #[test]
    fn tree_is_rooted_and_consistent() {
        for method in METHODS {
            if let Some(parent) = method.parent {
                lookup(parent).unwrap();
            }
            assert!(method.stages.is_empty() || method.ends_unambiguous());
        }
        assert_eq!(lookup("bilingual-precision-5").unwrap().code, "BP5");
        assert!(matches!(lookup("XX"), Err(StiffError::UnknownMethod(_))));
    }

    #[test]
    fn critical_nodes_are_root_leaves_and_branches() {
        let codes: Vec<&str> = critical_nodes().iter().map(|m| m.code).collect();
        assert_eq!(codes, vec!["N", "MP2", "BP5", "EP"]);
        assert!(render_latex().contains("[\\textbf{N} [MR"));
        assert!(render_dot().contains("\"BP4\" -> \"BP5\";"));
        assert!(render_tree().starts_with("N (null) *\n  MR (mono-recall)\n"));
    }
}
