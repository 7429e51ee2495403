use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ExtractionConfig;
use crate::fetcher::RawContent;
use crate::models::{
    merge_profiles, ExtractionResult, ExtractionTier, SiteProfile, Target, GENERIC_PROFILE,
};
use crate::plugins::extractors::{PatternRule, SelectorRule};
use crate::plugins::traits::{ExtractionRule, Page, PriceBounds, RuleOutcome};
use crate::renderer::PageRenderer;
use crate::utils::error::{AppError, ConfigError, ExtractionFailure};

/// A site profile with its rules compiled, in the order they are tried.
pub struct CompiledProfile {
    pub profile: SiteProfile,
    rules: Vec<Box<dyn ExtractionRule>>,
}

impl CompiledProfile {
    /// Site selectors first, then site patterns, then the generic patterns.
    pub fn compile(profile: SiteProfile, bounds: PriceBounds) -> Result<Self, ConfigError> {
        let invalid = |rule: &str, message: String| ConfigError::InvalidPattern {
            profile: profile.name.clone(),
            rule: rule.to_string(),
            message,
        };

        let mut rules: Vec<Box<dyn ExtractionRule>> = Vec::new();
        for selector in &profile.selectors {
            let rule = SelectorRule::new(&profile.name, selector, bounds)
                .map_err(|e| invalid(selector, e))?;
            rules.push(Box::new(rule));
        }
        for pattern in &profile.patterns {
            let rule = PatternRule::new(&profile.name, pattern, bounds)
                .map_err(|e| invalid(pattern, e))?;
            rules.push(Box::new(rule));
        }
        for rule in PatternRule::generic(bounds).map_err(|e| invalid("generic", e))? {
            rules.push(Box::new(rule));
        }

        Ok(Self { profile, rules })
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    fn block_marker<'a>(&'a self, markup: &str) -> Option<&'a str> {
        self.profile
            .block_markers
            .iter()
            .find(|marker| markup.contains(marker.as_str()))
            .map(|m| m.as_str())
    }
}

/// Result of running every rule over one version of a page.
#[derive(Debug, Default)]
struct Pass {
    found: Option<(rust_decimal::Decimal, String)>,
    malformed: Option<String>,
    attempts: Vec<String>,
}

pub struct Extractor {
    profiles: Vec<CompiledProfile>,
    render_fallback: bool,
    renderer: Option<Arc<dyn PageRenderer>>,
}

impl Extractor {
    /// Compiles `profiles`; a `generic` profile is appended when none is supplied.
    pub fn new(
        profiles: Vec<SiteProfile>,
        config: &ExtractionConfig,
        render_fallback: bool,
    ) -> Result<Self, ConfigError> {
        let bounds = PriceBounds {
            min: config.min_price,
            max: config.max_price,
        };

        let profiles = merge_profiles(profiles, Vec::new());
        let mut compiled = profiles
            .into_iter()
            .map(|p| CompiledProfile::compile(p, bounds))
            .collect::<Result<Vec<_>, _>>()?;

        if !compiled.iter().any(|p| p.name() == GENERIC_PROFILE) {
            compiled.push(CompiledProfile::compile(SiteProfile::generic(), bounds)?);
        }

        Ok(Self {
            profiles: compiled,
            render_fallback,
            renderer: None,
        })
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Picks the profile named by the target's category, else the first host
    /// match, else `generic`.
    pub fn profile_for(&self, target: &Target) -> &CompiledProfile {
        if let Some(category) = &target.category {
            if let Some(profile) = self.profiles.iter().find(|p| &p.profile.name == category) {
                return profile;
            }
            warn!("Unknown site profile '{}' for {}", category, target.name);
        }

        let host = target.host().unwrap_or_default();
        self.profiles
            .iter()
            .find(|p| p.profile.matches_host(&host))
            .or_else(|| self.profiles.iter().find(|p| p.name() == GENERIC_PROFILE))
            .unwrap_or(&self.profiles[self.profiles.len() - 1])
    }

    /// Static rules on the fetched markup, then the rendered DOM when permitted.
    ///
    /// Block markers only decide the outcome of a page that yielded no price.
    pub async fn extract(&self, content: &RawContent, profile: &CompiledProfile) -> ExtractionResult {
        let static_pass = Self::run_rules(&content.body, profile);
        if let Some((price, rule)) = static_pass.found {
            return ExtractionResult::Success {
                price,
                tier: ExtractionTier::Static,
                rule,
            };
        }

        if let Some(marker) = profile.block_marker(&content.body) {
            return ExtractionResult::Blocked {
                reason: format!("bot wall detected ({})", marker),
            };
        }

        let mut attempts = static_pass.attempts;
        let mut malformed = static_pass.malformed;

        if !(self.render_fallback && profile.profile.allow_render) {
            return Self::unresolved(malformed, attempts);
        }

        let Some(renderer) = &self.renderer else {
            return match malformed {
                Some(reason) => ExtractionResult::Error { reason },
                None => ExtractionResult::RenderRequired {
                    reason: "no renderer configured".to_string(),
                },
            };
        };

        debug!("No static match for {}, rendering with {}", content.url, profile.name());
        let rendered = match renderer.render(&content.final_url).await {
            Ok(html) => html,
            Err(failure) => {
                return match malformed {
                    Some(reason) => ExtractionResult::Error { reason },
                    None => failure.into(),
                };
            }
        };

        let rendered_pass = Self::run_rules(&rendered, profile);
        if let Some((price, rule)) = rendered_pass.found {
            return ExtractionResult::Success {
                price,
                tier: ExtractionTier::Rendered,
                rule,
            };
        }

        if let Some(marker) = profile.block_marker(&rendered) {
            return ExtractionResult::Blocked {
                reason: format!("bot wall detected after render ({})", marker),
            };
        }

        malformed = malformed.or(rendered_pass.malformed);
        attempts.extend(
            rendered_pass
                .attempts
                .into_iter()
                .map(|a| format!("rendered {}", a)),
        );
        Self::unresolved(malformed, attempts)
    }

    // Parsed DOM stays inside this synchronous call.
    fn run_rules(markup: &str, profile: &CompiledProfile) -> Pass {
        let page = Page::parse(markup);
        let mut pass = Pass::default();

        for rule in &profile.rules {
            match rule.attempt(&page) {
                RuleOutcome::Found(price) => {
                    debug!("Rule {} found {}", rule.name(), price);
                    pass.found = Some((price, rule.name().to_string()));
                    break;
                }
                RuleOutcome::Skipped(reason) => {
                    pass.attempts.push(format!("{}: {}", rule.name(), reason));
                }
                RuleOutcome::Malformed(reason) => {
                    pass.attempts.push(format!("{}: {}", rule.name(), reason));
                    pass.malformed.get_or_insert(reason);
                }
            }
        }

        pass
    }

    fn unresolved(malformed: Option<String>, attempts: Vec<String>) -> ExtractionResult {
        match malformed {
            Some(reason) => ExtractionResult::Error { reason },
            None => ExtractionResult::NotFound { attempts },
        }
    }
}

/// Built-in profiles overlaid with the optional profiles file.
pub fn load_profiles(config: &ExtractionConfig) -> Result<Vec<SiteProfile>, AppError> {
    let builtin = SiteProfile::builtin();
    let Some(path) = &config.profiles_file else {
        return Ok(builtin);
    };

    let content = std::fs::read_to_string(path)?;
    let extra = SiteProfile::parse_toml(&content)?;
    debug!("Loaded {} site profiles from {}", extra.len(), path.display());
    Ok(merge_profiles(builtin, extra))
}

impl From<ExtractionFailure> for ExtractionResult {
    fn from(failure: ExtractionFailure) -> Self {
        match failure {
            ExtractionFailure::ParseError(reason) => ExtractionResult::Error { reason },
            ExtractionFailure::RenderUnavailable(reason) => ExtractionResult::RenderRequired { reason },
        }
    }
}
