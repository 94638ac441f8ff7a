use serde::Deserialize;

use kinema_animation_core::generators::{calc_generator_duration, spring, Generator, SpringOptions};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpringFixture {
    from: f64,
    to: f64,
    stiffness: Option<f64>,
    damping: Option<f64>,
    mass: Option<f64>,
    duration_ms: Option<f64>,
    bounce: Option<f64>,
    rest_speed: Option<f64>,
    rest_delta: Option<f64>,
    expect: Expectation,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Expectation {
    final_value: f64,
    max_duration_ms: f64,
    overshoots: bool,
}

impl SpringFixture {
    fn options(&self) -> SpringOptions {
        SpringOptions {
            keyframes: [self.from, self.to],
            stiffness: self.stiffness,
            damping: self.damping,
            mass: self.mass,
            duration: self.duration_ms,
            bounce: self.bounce,
            rest_speed: self.rest_speed,
            rest_delta: self.rest_delta,
            ..SpringOptions::default()
        }
    }
}

fn run(name: &str) {
    let fixture: SpringFixture = kinema_test_fixtures::springs::load(name).expect("load spring fixture");
    let mut generator = spring(fixture.options());

    assert_eq!(generator.next(0.0).value, fixture.from, "{name}: starts at origin");

    let duration = calc_generator_duration(&mut spring(fixture.options())).expect("spring settles");
    assert!(
        duration <= fixture.expect.max_duration_ms,
        "{name}: settled after {duration}ms"
    );

    let direction = (fixture.to - fixture.from).signum();
    let mut overshot = false;
    let mut t = 0.0;
    while t <= duration {
        let state = generator.next(t);
        if (state.value - fixture.to) * direction > 1e-9 {
            overshot = true;
        }
        t += 10.0;
    }
    assert_eq!(overshot, fixture.expect.overshoots, "{name}: overshoot");

    let end = generator.next(duration);
    assert!(end.done, "{name}: done at calculated duration");
    assert_eq!(end.value, fixture.expect.final_value, "{name}: lands exactly on target");
    assert!(generator.next(duration + 500.0).done, "{name}: done stays true");
}

#[test]
fn default_transform_spring() {
    run("default-transform");
}

#[test]
fn critically_damped_spring_never_overshoots() {
    run("critically-damped");
}

#[test]
fn bouncy_duration_spring() {
    run("bouncy-duration");
}

#[test]
fn every_spring_fixture_is_covered() {
    assert_eq!(
        kinema_test_fixtures::springs::keys(),
        vec!["bouncy-duration", "critically-damped", "default-transform"]
    );
}
