use kconfig_lsp::ast::*;
use kconfig_lsp::kconfig::symbols;
use kconfig_lsp::lexer::Lexer;
use kconfig_lsp::parser;
use kconfig_lsp::uri::Uri;

const SAMPLE_KCONFIG: &str = r#"
mainmenu "Zephyr Kernel Configuration"

config AUDIT
	bool "Auditing support"
	depends on NET
	default y
	help
	  Enable auditing infrastructure that can be used with another
	  kernel subsystem, such as SELinux.

menuconfig MODULES
	bool "Enable loadable module support"
	modules
	help
	  Kernel modules are small pieces of compiled code which can
	  be inserted in the running kernel.

config MODVERSIONS
	bool "Module versioning support"
	depends on MODULES
	help
	  Usually, modules have to be recompiled whenever you switch
	  to a new kernel.

menu "General setup"
	depends on !UML

config SYSVIPC
	bool "System V IPC"
	help
	  Inter Process Communication is a suite of library functions.

choice
	prompt "Compiler optimization level"
	default CC_OPTIMIZE_FOR_PERFORMANCE

config CC_OPTIMIZE_FOR_PERFORMANCE
	bool "Optimize for performance (-O2)"

config CC_OPTIMIZE_FOR_SIZE
	bool "Optimize for size (-Os)"

endchoice

if EXPERT

config CHECKPOINT_RESTORE
	bool "Checkpoint/restore support"
	select PROC_CHILDREN
	default n

endif

config SYSCTL
	bool "Sysctl support" if EXPERT
	depends on PROC_FS
	select PROC_SYSCTL
	imply SYSCTL_EXCEPTION_TRACE
	default y
	help
	  The sysctl interface.

config FOO_RANGE
	int "Foo value"
	range 1 100
	default 50

config HAS_FEATURE
	def_bool y

config OPTIONAL_FEATURE
	def_tristate m if MODULES

config NEW_OPT
	bool "New option"
	default OLD_OPT

config OLD_OPT
	bool
	transitional

endmenu
"#;

#[test]
fn lexer_tokenizes_all_keywords() {
    let tokens = Lexer::new(SAMPLE_KCONFIG).tokenize();
    assert!(tokens.len() > 50);

    let kinds: Vec<_> = tokens.iter().map(|t| &t.kind).collect();
    use kconfig_lsp::lexer::TokenKind::*;
    assert!(kinds.contains(&&Config));
    assert!(kinds.contains(&&MenuConfig));
    assert!(kinds.contains(&&Menu));
    assert!(kinds.contains(&&EndMenu));
    assert!(kinds.contains(&&Choice));
    assert!(kinds.contains(&&EndChoice));
    assert!(kinds.contains(&&If));
    assert!(kinds.contains(&&EndIf));
    assert!(kinds.contains(&&MainMenu));
    assert!(kinds.contains(&&Bool));
    assert!(kinds.contains(&&Int));
    assert!(kinds.contains(&&Default));
    assert!(kinds.contains(&&Depends));
    assert!(kinds.contains(&&On));
    assert!(kinds.contains(&&Select));
    assert!(kinds.contains(&&Imply));
    assert!(kinds.contains(&&Help));
    assert!(kinds.contains(&&Modules));
    assert!(kinds.contains(&&Transitional));
    assert!(kinds.contains(&&DefBool));
    assert!(kinds.contains(&&DefTristate));
    assert!(kinds.contains(&&Range));
}

#[test]
fn parser_produces_correct_entries() {
    let tokens = Lexer::new(SAMPLE_KCONFIG).tokenize();
    let result = parser::parse(SAMPLE_KCONFIG, tokens);

    let names: Vec<String> = result
        .file
        .entries
        .iter()
        .filter_map(|e| match e {
            Entry::Config(c) | Entry::MenuConfig(c) => Some(c.name.clone()),
            _ => None,
        })
        .collect();

    assert!(names.contains(&"AUDIT".to_string()));
    assert!(names.contains(&"MODULES".to_string()));

    let has_menu = result.file.entries.iter().any(|e| matches!(e, Entry::Menu(_)));
    assert!(has_menu);

    let has_mainmenu = result.file.entries.iter().any(|e| matches!(e, Entry::MainMenu(_)));
    assert!(has_mainmenu);

    let errors: Vec<_> = result.diagnostics.iter().filter(|d| d.severity == DiagSeverity::Error).collect();
    assert!(errors.is_empty(), "unexpected parse errors: {:?}", errors);
}

fn build_table(source: &str) -> symbols::SymbolTable {
    let tokens = Lexer::new(source).tokenize();
    let result = parser::parse(source, tokens);
    let uri = Uri::file("/test/Kconfig");
    let (table, _root) = symbols::build(&uri, &[(uri.clone(), source.to_string(), result.file)]);
    table
}

#[test]
fn symbol_table_finds_all_definitions() {
    let table = build_table(SAMPLE_KCONFIG);

    let expected = [
        "AUDIT",
        "MODULES",
        "MODVERSIONS",
        "SYSVIPC",
        "CC_OPTIMIZE_FOR_PERFORMANCE",
        "CC_OPTIMIZE_FOR_SIZE",
        "CHECKPOINT_RESTORE",
        "SYSCTL",
        "FOO_RANGE",
        "HAS_FEATURE",
        "OPTIONAL_FEATURE",
        "NEW_OPT",
        "OLD_OPT",
    ];
    for name in expected {
        assert!(table.get(name).is_some(), "symbol {name} should be defined");
    }

    let audit = table.get("AUDIT").unwrap();
    assert_eq!(audit.kind, symbols::SymbolKind::Bool);
    assert_eq!(audit.prompts[0].text, "Auditing support");
    assert!(audit.help.is_some());

    assert!(table.get("MODULES").unwrap().is_menuconfig);
}

#[test]
fn help_text_strips_leading_indentation() {
    let table = build_table(SAMPLE_KCONFIG);
    let help = table.get("AUDIT").unwrap().help.as_ref().unwrap();
    assert!(help.starts_with("Enable auditing"));
    assert!(help.contains("SELinux"));
    assert!(!help.starts_with('\t'));
    assert!(!help.starts_with("  "));
}

#[test]
fn select_is_indexed_in_reverse() {
    let table = build_table(SAMPLE_KCONFIG);
    // CHECKPOINT_RESTORE selects PROC_CHILDREN; even though PROC_CHILDREN is
    // never itself defined in this fragment, the reverse index should still
    // record the selector so a hover/definition request on it can resolve.
    assert!(table.get("CHECKPOINT_RESTORE").is_some());
}

#[test]
fn menuconfig_under_if_block_is_conditionally_visible() {
    let table = build_table(SAMPLE_KCONFIG);
    // EXPERT is never assigned a value here, so it defaults to `n` and the
    // CHECKPOINT_RESTORE entry nested under `if EXPERT` stays invisible.
    assert!(!table.visible("CHECKPOINT_RESTORE"));
}
