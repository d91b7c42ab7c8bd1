use leptos::prelude::*;
use leptos_router::components::*;
use leptos_router::path;

use walkthrough::{RegisteredTour, RouteMode, Step, Trigger, WalkthroughOptions};

use crate::binding::{provide_walkthrough, use_route_tours, use_walkthrough};

fn persisted(tour_id: &str) -> WalkthroughOptions {
    WalkthroughOptions::default()
        .with_tour_id(tour_id)
        .with_persistence(true, true)
}

fn demo_tours() -> Vec<RegisteredTour> {
    vec![
        RegisteredTour::new(
            "welcome",
            "/",
            vec![
                Step::new("#demo-nav")
                    .title("Navigation")
                    .content("<p>Every page of the demo is one click away.</p>"),
                Step::new("#demo-help")
                    .title("Help")
                    .content("<p>Replay the help tour at any time.</p>"),
            ],
        )
        .with_options(persisted("demo-welcome"))
        .once_per_session(true)
        .order(0),
        RegisteredTour::new(
            "settings",
            "/settings*",
            vec![Step::new("#demo-theme")
                .title("Theme")
                .content("<p>Switch between light and dark.</p>")
                .required(true)],
        )
        .with_options(persisted("demo-settings")),
        RegisteredTour::new(
            "help",
            "/",
            vec![Step::new("#demo-help").title("Still here")],
        )
        .trigger(Trigger::Manual),
    ]
}

#[component]
pub fn App() -> impl IntoView {
    view! {
        <Router>
            <Shell />
        </Router>
    }
}

#[component]
fn Shell() -> impl IntoView {
    let state = provide_walkthrough();
    let routes = use_route_tours(RouteMode::Chained, |orchestrator| {
        orchestrator.register_tours(demo_tours());
    });

    let replay_help = move |_| {
        if let Some(runner) = routes.try_get_value() {
            if let Err(e) = runner.orchestrator().start_tour_by_id("help") {
                log::warn!("{}", e);
            }
        }
    };

    let reset = move |_| {
        if let Some(runner) = routes.try_get_value() {
            runner.orchestrator().reset_all_tour_progress();
        }
    };

    view! {
        <nav id="demo-nav">
            <A href="/">"Home"</A>
            " | "
            <A href="/settings">"Settings"</A>
        </nav>
        <main>
            <Routes fallback=|| view! { <p>"Not found"</p> }>
                <Route path=path!("/") view=Home />
                <Route path=path!("/settings") view=Settings />
            </Routes>
        </main>
        <footer>
            <button id="demo-help" on:click=replay_help>"Help"</button>
            <button on:click=reset>"Reset progress"</button>
            <span>
                {move || match state.current_step.get() {
                    Some(index) => format!("Tour step {}", index + 1),
                    None => "No tour running".to_string(),
                }}
            </span>
        </footer>
    }
}

#[component]
fn Home() -> impl IntoView {
    view! { <h1>"Walkthrough demo"</h1> }
}

#[component]
fn Settings() -> impl IntoView {
    let state = use_walkthrough();
    let tour_button = move |_| {
        state.start(
            vec![
                Step::new("#demo-theme").title("Theme"),
                Step::new("#demo-nav").title("Back home"),
            ],
            WalkthroughOptions::default(),
        );
    };

    view! {
        <h1>"Settings"</h1>
        <label id="demo-theme">
            <input type="checkbox" />
            " Dark mode"
        </label>
        <button on:click=tour_button>"Explain this page"</button>
    }
}
