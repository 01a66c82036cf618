pub mod resolver;
pub mod rules;

pub use resolver::RuleResolver;
pub use rules::AvailabilityRuleService;
