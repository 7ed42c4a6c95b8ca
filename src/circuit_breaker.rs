use failsafe::{backoff, failure_policy, Config};
use std::time::Duration;

/// Concrete breaker type so services can hold one in a struct field.
pub type ProviderBreaker = failsafe::StateMachine<
    failure_policy::ConsecutiveFailures<backoff::Exponential>,
    (),
>;

/// Creates a circuit breaker for outbound notification providers so a
/// failing email/WhatsApp API cannot drag every order-creation request
/// through its timeout.
///
/// Notification delivery is best-effort: a rejected call surfaces as a
/// `NotificationDelivery` error and never fails the surrounding order flow.
pub fn create_provider_circuit_breaker() -> ProviderBreaker {
    // Five consecutive provider failures open the circuit; recovery
    // attempts back off from 10s to 60s.
    let policy = failure_policy::consecutive_failures(
        5,
        backoff::exponential(Duration::from_secs(10), Duration::from_secs(60)),
    );
    Config::new().failure_policy(policy).build()
}
