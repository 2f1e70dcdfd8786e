use super::*;

const PROTECTED: &[&str] = &["/properties", "/properties/new", "/properties/12/edit", "/properties/12"];
const GUEST_ONLY: &[&str] = &["/login", "/register", "/login/reset"];
const NEUTRAL: &[&str] = &["/", "/loginish", "/registered", "/propertiesfoo", "/about", ""];

fn login_redirect(from: &str) -> RouteDecision {
    RouteDecision::RedirectTo { path: "/login".into(), query: vec![("from".into(), from.into())] }
}

// =============================================================================
// classify
// =============================================================================

#[test]
fn classify_protected_paths() {
    let cfg = GuardConfig::default();
    for path in PROTECTED {
        assert_eq!(cfg.classify(path), PathClass::Protected, "{path}");
    }
}

#[test]
fn classify_guest_only_paths() {
    let cfg = GuardConfig::default();
    for path in GUEST_ONLY {
        assert_eq!(cfg.classify(path), PathClass::GuestOnly, "{path}");
    }
}

#[test]
fn classify_lookalike_prefixes_are_neutral() {
    let cfg = GuardConfig::default();
    for path in NEUTRAL {
        assert_eq!(cfg.classify(path), PathClass::Neutral, "{path}");
    }
}

// =============================================================================
// decide
// =============================================================================

#[test]
fn protected_without_signal_redirects_to_login_with_from() {
    let cfg = GuardConfig::default();
    for path in PROTECTED {
        assert_eq!(cfg.decide(path, false), login_redirect(path), "{path}");
    }
}

#[test]
fn guest_only_with_signal_redirects_home() {
    let cfg = GuardConfig::default();
    for path in GUEST_ONLY {
        assert_eq!(
            cfg.decide(path, true),
            RouteDecision::RedirectTo { path: "/properties".into(), query: Vec::new() },
            "{path}"
        );
    }
}

#[test]
fn every_other_combination_allows() {
    let cfg = GuardConfig::default();
    for path in PROTECTED {
        assert_eq!(cfg.decide(path, true), RouteDecision::Allow, "{path}");
    }
    for path in GUEST_ONLY {
        assert_eq!(cfg.decide(path, false), RouteDecision::Allow, "{path}");
    }
    for path in NEUTRAL {
        assert_eq!(cfg.decide(path, true), RouteDecision::Allow, "{path}");
        assert_eq!(cfg.decide(path, false), RouteDecision::Allow, "{path}");
    }
}

#[test]
fn custom_config_is_honoured() {
    let cfg = GuardConfig {
        protected: vec!["/admin".into()],
        guest_only: vec!["/signin".into()],
        home: "/dashboard".into(),
        login: "/signin".into(),
        matcher: vec!["/:path*".into()],
    };
    assert_eq!(
        cfg.decide("/admin/users", false),
        RouteDecision::RedirectTo { path: "/signin".into(), query: vec![("from".into(), "/admin/users".into())] }
    );
    assert_eq!(
        cfg.decide("/signin", true),
        RouteDecision::RedirectTo { path: "/dashboard".into(), query: Vec::new() }
    );
    assert_eq!(cfg.decide("/properties", false), RouteDecision::Allow);
}

// =============================================================================
// location
// =============================================================================

#[test]
fn location_allow_is_none() {
    assert!(RouteDecision::Allow.location(Some("a=1")).is_none());
}

#[test]
fn location_encodes_from() {
    let decision = login_redirect("/properties/5/edit");
    assert_eq!(decision.location(None).unwrap(), "/login?from=%2Fproperties%2F5%2Fedit");
}

#[test]
fn location_without_query_is_bare_path() {
    let decision = RouteDecision::RedirectTo { path: "/properties".into(), query: Vec::new() };
    assert_eq!(decision.location(None).unwrap(), "/properties");
    assert_eq!(decision.location(Some("")).unwrap(), "/properties");
}

#[test]
fn location_keeps_original_query() {
    let decision = RouteDecision::RedirectTo { path: "/properties".into(), query: Vec::new() };
    assert_eq!(decision.location(Some("tab=mine&x=1")).unwrap(), "/properties?tab=mine&x=1");
}

#[test]
fn location_replaces_existing_from() {
    let decision = login_redirect("/properties");
    assert_eq!(
        decision.location(Some("from=%2Fevil&keep=1")).unwrap(),
        "/login?keep=1&from=%2Fproperties"
    );
}

// =============================================================================
// matches
// =============================================================================

#[test]
fn matcher_covers_navigation_surface() {
    let cfg = GuardConfig::default();
    for path in ["/", "/login", "/register", "/properties", "/properties/new", "/properties/3/edit", "/properties/"] {
        assert!(cfg.matches(path), "{path}");
    }
}

#[test]
fn matcher_skips_other_paths() {
    let cfg = GuardConfig::default();
    for path in ["/favicon.ico", "/assets/app.js", "/loginish", "/healthz"] {
        assert!(!cfg.matches(path), "{path}");
    }
}

#[test]
fn pattern_named_segments() {
    assert!(pattern_match("/properties/:id", "/properties/4"));
    assert!(!pattern_match("/properties/:id", "/properties"));
    assert!(!pattern_match("/properties/:id", "/properties/4/edit"));
    assert!(pattern_match("/properties/:rest+", "/properties/4/edit"));
    assert!(!pattern_match("/properties/:rest+", "/properties"));
    assert!(pattern_match("/properties/:rest*", "/properties"));
}
