pub mod shared {
    pub mod core {
        pub mod aggregate;
        pub mod clock;
    }
    pub mod infrastructure {
        pub mod event_bus;
        pub mod integration_event;
        pub mod outbox;
        pub mod persistence;
        pub mod shutdown;
    }
}

pub mod modules {
    pub mod payments {
        pub mod core {
            pub mod events;
            pub mod payment;
        }
        pub mod use_cases {
            pub mod errors;
            pub mod create_payment {
                pub mod command;
                pub mod handler;
            }
            pub mod complete_payment {
                pub mod command;
                pub mod handler;
            }
            pub mod fail_payment {
                pub mod command;
                pub mod handler;
            }
        }
        pub mod adapters {
            pub mod outbound {
                pub mod integration_events;
            }
        }
    }
}

pub mod shell;
