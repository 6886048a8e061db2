use std::rc::Rc;
use vellum_app::{Container, DiError, Provider, ProviderScope, Token};

#[test]
fn value_and_factory_providers_resolve() {
    let container = Container::root();
    container.register("config.port", Provider::value(8080u16));
    container.register(
        "config.url",
        Provider::factory(|c| {
            let port = c.resolve::<u16>(&Token::from("config.port"))?;
            Ok(format!("http://localhost:{port}"))
        }),
    );

    let url = container.resolve::<String>(&Token::from("config.url")).unwrap();
    assert_eq!(*url, "http://localhost:8080");
}

#[test]
fn unknown_token_is_an_error() {
    let container = Container::root();
    match container.resolve::<u16>(&Token::from("missing")) {
        Err(DiError::UnknownToken(token)) => {
            assert_eq!(token.name(), "missing")
        }
        _ => panic!("expected UnknownToken"),
    }
    assert!(!container.has(&Token::from("missing")));
}

#[test]
fn singletons_memoize_while_transients_do_not() {
    let container = Container::root();
    container.register(
        "singleton",
        Provider::factory(|_| Ok(Vec::<u8>::with_capacity(1))),
    );
    container.register(
        "transient",
        Provider::factory_scoped(ProviderScope::Transient, |_| {
            Ok(Vec::<u8>::with_capacity(1))
        }),
    );

    let s1 = container.resolve::<Vec<u8>>(&Token::from("singleton")).unwrap();
    let s2 = container.resolve::<Vec<u8>>(&Token::from("singleton")).unwrap();
    assert!(Rc::ptr_eq(&s1, &s2));

    let t1 = container.resolve::<Vec<u8>>(&Token::from("transient")).unwrap();
    let t2 = container.resolve::<Vec<u8>>(&Token::from("transient")).unwrap();
    assert!(!Rc::ptr_eq(&t1, &t2));
}

#[test]
fn existing_redirects_to_another_token() {
    let container = Container::root();
    container.register("logger", Provider::value("stdout logger".to_string()));
    container.register("log", Provider::existing("logger"));

    let log = container.resolve::<String>(&Token::from("log")).unwrap();
    assert_eq!(*log, "stdout logger");
}

#[test]
fn class_dependencies_resolve_in_declaration_order() {
    struct Database {
        url: String,
        pool_size: u32,
    }

    let container = Container::root();
    container.register("db.url", Provider::value("postgres://db".to_string()));
    container.register("db.poolSize", Provider::value(8u32));
    container.register(
        "db",
        Provider::class(
            vec![Token::from("db.url"), Token::from("db.poolSize")],
            |deps| {
                let url = deps[0].clone().downcast::<String>().unwrap();
                let pool_size = deps[1].clone().downcast::<u32>().unwrap();
                Database {
                    url: (*url).clone(),
                    pool_size: *pool_size,
                }
            },
        ),
    );

    let db = container.resolve::<Database>(&Token::from("db")).unwrap();
    assert_eq!(db.url, "postgres://db");
    assert_eq!(db.pool_size, 8);
}

#[test]
fn constructor_cycles_are_detected() {
    let container = Container::root();
    container.register(
        "a",
        Provider::class(vec![Token::from("b")], |_| "a".to_string()),
    );
    container.register(
        "b",
        Provider::class(vec![Token::from("a")], |_| "b".to_string()),
    );

    match container.resolve::<String>(&Token::from("a")) {
        Err(DiError::CircularDependency { token, chain }) => {
            assert_eq!(token.name(), "a");
            assert_eq!(chain, "a -> b -> a");
        }
        _ => panic!("expected CircularDependency"),
    }
}

#[test]
fn panicking_provider_does_not_poison_resolution() {
    let container = Container::root();
    container.register(
        "fragile",
        Provider::factory(|_| -> Result<i32, DiError> {
            panic!("provider exploded")
        }),
    );

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        container.resolve::<i32>(&Token::from("fragile"))
    }));
    assert!(result.is_err());

    // the token came back off the resolution stack during the unwind
    container.override_provider("fragile", Provider::value(1i32));
    assert_eq!(*container.resolve::<i32>(&Token::from("fragile")).unwrap(), 1);
}

#[test]
fn child_containers_delegate_to_their_parent() {
    let root = Container::root();
    root.register("shared", Provider::value(1i32));

    let child = root.child();
    child.register("local", Provider::value(2i32));

    assert_eq!(*child.resolve::<i32>(&Token::from("shared")).unwrap(), 1);
    assert_eq!(*child.resolve::<i32>(&Token::from("local")).unwrap(), 2);

    // the parent does not see child registrations
    assert!(root.resolve::<i32>(&Token::from("local")).is_err());
    assert!(child.has(&Token::from("shared")));
}

#[test]
fn override_replaces_provider_and_memo() {
    let container = Container::root();
    container.register("greeting", Provider::factory(|_| Ok("hello".to_string())));

    let first = container
        .resolve::<String>(&Token::from("greeting"))
        .unwrap();
    assert_eq!(*first, "hello");

    container.override_provider("greeting", Provider::value("mock".to_string()));
    let second = container
        .resolve::<String>(&Token::from("greeting"))
        .unwrap();
    assert_eq!(*second, "mock");
}

#[test]
fn clear_empties_the_container() {
    let container = Container::root();
    container.register("x", Provider::value(1i32));
    container.resolve::<i32>(&Token::from("x")).unwrap();

    container.clear();
    assert!(!container.has(&Token::from("x")));
    assert!(container.resolve::<i32>(&Token::from("x")).is_err());
}

#[test]
fn wrong_type_is_reported() {
    let container = Container::root();
    container.register("port", Provider::value(8080u16));
    assert!(matches!(
        container.resolve::<String>(&Token::from("port")),
        Err(DiError::WrongType(_))
    ));
}
