use sysdef_lib::model::{ClientType, ServerType};
use sysdef_lib::parse_tree::TokenKind;
use sysdef_lib::parse_tree::memory::MemoryParser;
use sysdef_lib::{BuildParams, ErrorKind, model_system};

use super::common::*;

/// appA's `calc` client is exported as `ifOut`; appB serves `calc` as `ifIn`.
fn two_apps(env: &TestEnv) -> MemoryParser {
  env.touch("interfaces/calc.api");
  let client = env.component("components/clientComp", vec![requires_api(vec![vec![path("calc.api")]])]);
  let server = env.component("components/serverComp", vec![provides_api(vec![vec![path("calc.api")]])]);
  let app_a = env.adef(
    "appA",
    vec![
      executables(&[("E", &["components/clientComp"])]),
      extern_section(vec![vec![name("ifOut"), name("E"), name("clientComp"), name("calc")]]),
    ],
  );
  let app_b = env.adef(
    "appB",
    vec![
      executables(&[("S", &["components/serverComp"])]),
      extern_section(vec![vec![name("ifIn"), name("S"), name("serverComp"), name("calc")]]),
    ],
  );
  MemoryParser::new()
    .with_cdef(client)
    .with_cdef(server)
    .with_adef(app_a)
    .with_adef(app_b)
}

fn app_binding() -> Vec<sysdef_lib::parse_tree::Token> {
  vec![name("appA"), name("ifOut"), agent("appB"), name("ifIn")]
}

#[test]
fn extern_interfaces_bind_across_apps() {
  let env = TestEnv::new();
  let sdef = env.sdef(
    "system",
    vec![
      interface_search(&["interfaces"]),
      apps(&["appA", "appB"]),
      bindings(vec![app_binding()]),
    ],
  );
  let sdef_path = sdef.path.clone();
  let parser = two_apps(&env).with_sdef(sdef);

  let mut params = BuildParams::default();
  let system = model_system(&sdef_path, &mut params, &parser).unwrap();

  assert_eq!(system.name, "system");
  assert_eq!(system.bindings.len(), 1);
  let binding = &system.bindings[0];
  assert_eq!(binding.client_type, ClientType::ExternalApp);
  assert_eq!(binding.client_agent, "appA");
  assert_eq!(binding.client_interface, "ifOut");
  assert_eq!(binding.server_type, ServerType::ExternalApp);
  assert_eq!(binding.server_agent, "appB");
  assert_eq!(binding.server_interface, "ifIn");

  let server = &system.apps["appB"].executables[0].instances[0];
  assert_eq!(server.server_apis[0].name, "S.serverComp.calc");
}

#[test]
fn search_paths_are_written_back() {
  let env = TestEnv::new();
  let sdef = env.sdef(
    "system",
    vec![
      interface_search(&["interfaces"]),
      apps(&["appA", "appB"]),
      bindings(vec![app_binding()]),
    ],
  );
  let sdef_path = sdef.path.clone();
  let parser = two_apps(&env).with_sdef(sdef);

  let mut params = BuildParams::default();
  model_system(&sdef_path, &mut params, &parser).unwrap();

  assert_eq!(params.source_dirs.first(), Some(&env.root));
  assert!(contains_dir(&params.interface_dirs, &env.root.join("interfaces")));
}

#[test]
fn unbound_client_is_reported_by_full_name() {
  let env = TestEnv::new();
  env.touch("calc.api");
  let comp = env.component("Comp", vec![requires_api(vec![vec![path("calc.api")]])]);
  let app = env.adef("A", vec![executables(&[("E", &["Comp"])])]);
  let sdef = env.sdef("system", vec![interface_search(&["."]), apps(&["A"])]);
  let sdef_path = sdef.path.clone();
  let parser = MemoryParser::new().with_cdef(comp).with_adef(app).with_sdef(sdef);

  let err = model_system(&sdef_path, &mut BuildParams::default(), &parser).unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Conflict);
  assert!(err.to_string().contains("A.E.Comp.calc"), "{err}");
}

#[test]
fn optional_client_may_stay_unbound() {
  let env = TestEnv::new();
  env.touch("calc.api");
  let comp = env.component(
    "Comp",
    vec![requires_api(vec![vec![
      path("calc.api"),
      tok(TokenKind::ClientIpcOption, "[optional]"),
    ]])],
  );
  let app = env.adef("A", vec![executables(&[("E", &["Comp"])])]);
  let sdef = env.sdef("system", vec![interface_search(&["."]), apps(&["A"])]);
  let sdef_path = sdef.path.clone();
  let parser = MemoryParser::new().with_cdef(comp).with_adef(app).with_sdef(sdef);

  let system = model_system(&sdef_path, &mut BuildParams::default(), &parser).unwrap();
  assert!(system.bindings.is_empty());
}

#[test]
fn user_rebinding_cites_first_binding() {
  let env = TestEnv::new();
  let bob = || vec![agent("<bob>"), name("ifX"), agent("appB"), name("ifIn")];
  let sdef = env.sdef(
    "system",
    vec![
      interface_search(&["interfaces"]),
      apps(&["appA", "appB"]),
      bindings(vec![app_binding(), bob(), bob()]),
    ],
  );
  let sdef_path = sdef.path.clone();
  let parser = two_apps(&env).with_sdef(sdef);

  let err = model_system(&sdef_path, &mut BuildParams::default(), &parser).unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Duplicate);
  assert!(err.to_string().contains("<bob>.ifX"), "{err}");
  assert!(err.to_string().contains("line 11"), "{err}");
}

#[test]
fn missing_pre_built_interface_is_named() {
  let env = TestEnv::new();
  let sdef = env.sdef(
    "system",
    vec![
      interface_search(&["interfaces"]),
      apps(&["appA", "appB"]),
      bindings(vec![vec![
        name("appA"),
        tok(TokenKind::Star, "*"),
        name("ifA"),
        agent("appB"),
        name("ifIn"),
      ]]),
    ],
  );
  let sdef_path = sdef.path.clone();
  let parser = two_apps(&env).with_sdef(sdef);

  let err = model_system(&sdef_path, &mut BuildParams::default(), &parser).unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
  assert!(err.to_string().contains("ifA"), "{err}");
}

#[test]
fn pre_built_interface_bound_by_system() {
  let env = TestEnv::new();
  env.touch("interfaces/le_info.api");
  let client = env.adef("client", vec![pre_built_api(vec![path("le_info.api")])]);
  let sdef = env.sdef(
    "system",
    vec![
      interface_search(&["interfaces"]),
      apps(&["appA", "appB", "client"]),
      bindings(vec![
        app_binding(),
        vec![
          name("client"),
          tok(TokenKind::Star, "*"),
          name("le_info"),
          agent("<root>"),
          name("le_info"),
        ],
      ]),
    ],
  );
  let sdef_path = sdef.path.clone();
  let parser = two_apps(&env).with_adef(client).with_sdef(sdef);

  let system = model_system(&sdef_path, &mut BuildParams::default(), &parser).unwrap();
  assert!(system.apps["client"].pre_built_client_interfaces["le_info"].binding.is_some());
  assert_eq!(system.bindings[1].server_type, ServerType::ExternalUser);
}

#[test]
fn shared_sub_component_is_modelled_once_and_built_first() {
  let env = TestEnv::new();
  let d = env.component("components/D", vec![]);
  let b = env.component("components/B", vec![requires_component(&["components/D"])]);
  let c = env.component("components/C", vec![requires_component(&["components/D"])]);
  let app = env.adef(
    "A",
    vec![executables(&[("E", &["components/B", "components/C"]), ("F", &["components/D"])])],
  );
  let sdef = env.sdef("system", vec![apps(&["A"])]);
  let sdef_path = sdef.path.clone();
  let parser = MemoryParser::new()
    .with_cdef(d)
    .with_cdef(b)
    .with_cdef(c)
    .with_adef(app)
    .with_sdef(sdef);

  let system = model_system(&sdef_path, &mut BuildParams::default(), &parser).unwrap();
  assert_eq!(system.model.components().count(), 3);

  let exe = &system.apps["A"].executables[0];
  let names: Vec<_> = exe
    .instances
    .iter()
    .map(|i| system.model.component(i.component).name.as_str())
    .collect();
  assert_eq!(names, vec!["D", "B", "C"]);

  let order = system.model.component_build_order().unwrap();
  assert_eq!(system.model.component(order[0]).name, "D");
}

#[test]
fn verbose_run_models_the_same_system() {
  let env = TestEnv::new();
  let sdef = env.sdef(
    "system",
    vec![
      interface_search(&["interfaces"]),
      apps(&["appA", "appB"]),
      bindings(vec![app_binding()]),
    ],
  );
  let sdef_path = sdef.path.clone();
  let parser = two_apps(&env).with_sdef(sdef);

  let mut params = BuildParams::default().with_verbose(true);
  let system = model_system(&sdef_path, &mut params, &parser).unwrap();
  let json = system.to_json().unwrap();
  assert!(json.contains("\"appA\""));
  assert!(json.contains("ifOut"));
}

#[test]
fn unknown_app_lists_search_dirs() {
  let env = TestEnv::new();
  let sdef = env.sdef("system", vec![apps(&["ghost"])]);
  let sdef_path = sdef.path.clone();
  let parser = MemoryParser::new().with_sdef(sdef);

  let err = model_system(&sdef_path, &mut BuildParams::default(), &parser).unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
  assert!(err.to_string().contains(&env.root.display().to_string()), "{err}");
}

#[test]
fn system_binding_replaces_app_binding() {
  let env = TestEnv::new();
  env.touch("interfaces/le_info.api");
  let le_info = |server: &str| {
    vec![
      tok(TokenKind::Star, "*"),
      name("le_info"),
      agent(server),
      name("le_info"),
    ]
  };
  let client = env.adef(
    "client",
    vec![
      pre_built_api(vec![path("le_info.api")]),
      adef_bindings(vec![le_info("ghost")]),
    ],
  );
  let mut system_binding = vec![name("client")];
  system_binding.extend(le_info("<root>"));
  let sdef = env.sdef(
    "system",
    vec![
      interface_search(&["interfaces"]),
      apps(&["client"]),
      bindings(vec![system_binding]),
    ],
  );
  let sdef_path = sdef.path.clone();
  let parser = MemoryParser::new().with_adef(client).with_sdef(sdef);

  let system = model_system(&sdef_path, &mut BuildParams::default(), &parser).unwrap();
  let same: Vec<_> = system
    .bindings
    .iter()
    .filter(|b| b.client_agent == "client" && b.client_interface == "*.le_info")
    .collect();
  assert_eq!(same.len(), 1);
  assert_eq!(same[0].server_type, ServerType::ExternalUser);
  assert_eq!(same[0].server_agent, "root");
  assert!(!system.to_json().unwrap().contains("ghost"));
}

#[test]
fn caller_source_dirs_are_searched_before_the_sdef_dir() {
  let env = TestEnv::new();
  let preferred = env.adef("user/foo", vec![]);
  let shadowed = env.adef("sys/foo", vec![]);
  let sdef = env.sdef("sys/system", vec![apps(&["foo"])]);
  let sdef_path = sdef.path.clone();
  let parser = MemoryParser::new()
    .with_adef(preferred)
    .with_adef(shadowed)
    .with_sdef(sdef);

  let mut params = BuildParams::default().with_source_dir(env.root.join("user"));
  let system = model_system(&sdef_path, &mut params, &parser).unwrap();

  assert_eq!(system.apps["foo"].def_path, env.root.join("user/foo.adef"));
  assert_eq!(params.source_dirs, vec![env.root.join("user"), env.root.join("sys")]);
}
