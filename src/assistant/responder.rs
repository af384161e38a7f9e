//! Rule-based reply selection.
//!
//! Special intents are tried first, in a fixed order. Only when none of them
//! fire are the topics scored against the input.

use std::time::Duration;

use regex::Regex;
use serde::Serialize;

use super::knowledge::{KnowledgeBase, KnowledgeTopic, Skill};

pub const MIN_TOPIC_SCORE: u32 = 3;
const PHRASE_KEYWORD_WEIGHT: u32 = 4;
const WORD_KEYWORD_WEIGHT: u32 = 2;
const TOPIC_FACTS_IN_REPLY: usize = 3;

const GREETING_PHRASES: &[&str] = &["good morning", "good afternoon", "good evening", "how are you"];
const FAREWELL_PHRASES: &[&str] = &["bye", "see you", "good night", "goodnight", "later"];
const GRATITUDE_PHRASES: &[&str] = &["thank"];
const PAGES_PHRASES: &[&str] = &[
    "list all pages",
    "list the pages",
    "all pages",
    "what pages",
    "which pages",
    "list all sections",
    "all sections",
    "what sections",
    "which sections",
    "site map",
    "sitemap",
];
const PROFILE_PHRASES: &[&str] = &[
    "who are you",
    "what are you",
    "who is alban",
    "your name",
    "introduce yourself",
    "about yourself",
    "profile",
];
const CONTACT_PHRASES: &[&str] = &[
    "email",
    "e mail",
    "phone",
    "whatsapp",
    "linkedin",
    "get in touch",
    "reach you",
];
const SKILLS_LIST_PHRASES: &[&str] = &[
    "list all skills",
    "all skills",
    "what skills",
    "which skills",
    "your skills",
    "skill set",
    "skillset",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseCategory {
    Greeting,
    Farewell,
    Gratitude,
    Pages,
    Profile,
    Contact,
    SkillsList,
    Skill,
    Topic,
    Fallback,
}

impl ResponseCategory {
    pub const ALL: [ResponseCategory; 10] = [
        ResponseCategory::Greeting,
        ResponseCategory::Farewell,
        ResponseCategory::Gratitude,
        ResponseCategory::Pages,
        ResponseCategory::Profile,
        ResponseCategory::Contact,
        ResponseCategory::SkillsList,
        ResponseCategory::Skill,
        ResponseCategory::Topic,
        ResponseCategory::Fallback,
    ];

    /// Upper-case name used in `ASSISTANT_DELAY_<NAME>_MS`.
    pub fn env_name(self) -> &'static str {
        match self {
            ResponseCategory::Greeting => "GREETING",
            ResponseCategory::Farewell => "FAREWELL",
            ResponseCategory::Gratitude => "GRATITUDE",
            ResponseCategory::Pages => "PAGES",
            ResponseCategory::Profile => "PROFILE",
            ResponseCategory::Contact => "CONTACT",
            ResponseCategory::SkillsList => "SKILLS_LIST",
            ResponseCategory::Skill => "SKILL",
            ResponseCategory::Topic => "TOPIC",
            ResponseCategory::Fallback => "FALLBACK",
        }
    }
}

/// Simulated "thinking" time per reply category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseDelays {
    pub greeting: Duration,
    pub farewell: Duration,
    pub gratitude: Duration,
    pub pages: Duration,
    pub profile: Duration,
    pub contact: Duration,
    pub skills_list: Duration,
    pub skill: Duration,
    pub topic: Duration,
    pub fallback: Duration,
}

impl Default for ResponseDelays {
    fn default() -> Self {
        Self {
            greeting: Duration::from_millis(150),
            farewell: Duration::from_millis(200),
            gratitude: Duration::from_millis(150),
            pages: Duration::from_millis(300),
            profile: Duration::from_millis(350),
            contact: Duration::from_millis(350),
            skills_list: Duration::from_millis(400),
            skill: Duration::from_millis(400),
            topic: Duration::from_millis(450),
            fallback: Duration::from_millis(550),
        }
    }
}

impl ResponseDelays {
    pub fn get(&self, category: ResponseCategory) -> Duration {
        *self.slot(category)
    }

    pub fn set(&mut self, category: ResponseCategory, delay: Duration) {
        *self.slot_mut(category) = delay;
    }

    fn slot(&self, category: ResponseCategory) -> &Duration {
        match category {
            ResponseCategory::Greeting => &self.greeting,
            ResponseCategory::Farewell => &self.farewell,
            ResponseCategory::Gratitude => &self.gratitude,
            ResponseCategory::Pages => &self.pages,
            ResponseCategory::Profile => &self.profile,
            ResponseCategory::Contact => &self.contact,
            ResponseCategory::SkillsList => &self.skills_list,
            ResponseCategory::Skill => &self.skill,
            ResponseCategory::Topic => &self.topic,
            ResponseCategory::Fallback => &self.fallback,
        }
    }

    fn slot_mut(&mut self, category: ResponseCategory) -> &mut Duration {
        match category {
            ResponseCategory::Greeting => &mut self.greeting,
            ResponseCategory::Farewell => &mut self.farewell,
            ResponseCategory::Gratitude => &mut self.gratitude,
            ResponseCategory::Pages => &mut self.pages,
            ResponseCategory::Profile => &mut self.profile,
            ResponseCategory::Contact => &mut self.contact,
            ResponseCategory::SkillsList => &mut self.skills_list,
            ResponseCategory::Skill => &mut self.skill,
            ResponseCategory::Topic => &mut self.topic,
            ResponseCategory::Fallback => &mut self.fallback,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub category: ResponseCategory,
    pub text: String,
    pub delay: Duration,
    /// Matched topic id or skill name.
    pub subject: Option<String>,
}

/// Lowercase, punctuation to spaces, whitespace collapsed, trimmed.
pub fn normalize(input: &str) -> String {
    let spaced: String = input
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Words longer than two characters.
pub fn tokens(normalized: &str) -> Vec<&str> {
    normalized
        .split(' ')
        .filter(|w| w.chars().count() > 2)
        .collect()
}

fn contains_any(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| text.contains(p))
}

/// Whole-word phrase containment on normalized text.
fn contains_words(text: &str, phrase: &str) -> bool {
    !phrase.is_empty() && format!(" {} ", text).contains(&format!(" {} ", phrase))
}

struct IndexedTopic {
    keywords: Vec<String>,
    facts: Vec<String>,
}

struct IndexedSkill {
    names: Vec<String>,
    category: String,
}

pub struct Responder {
    kb: KnowledgeBase,
    topics: Vec<IndexedTopic>,
    skills: Vec<IndexedSkill>,
    greeting: Option<Regex>,
    delays: ResponseDelays,
}

impl Responder {
    pub fn new(kb: KnowledgeBase, delays: ResponseDelays) -> Self {
        let topics = kb
            .topics
            .iter()
            .map(|t| IndexedTopic {
                keywords: t
                    .keywords
                    .iter()
                    .map(|k| normalize(k))
                    .filter(|k| !k.is_empty())
                    .collect(),
                facts: t.facts.iter().map(|f| normalize(f)).collect(),
            })
            .collect();

        let skills = kb
            .skills
            .iter()
            .map(|s| IndexedSkill {
                names: std::iter::once(&s.name)
                    .chain(s.aliases.iter())
                    .map(|n| normalize(n))
                    .filter(|n| !n.is_empty())
                    .collect(),
                category: normalize(&s.category),
            })
            .collect();

        let greeting = Regex::new(r"^(hi|hey|hello|yo|hiya)\b").ok();

        Self {
            kb,
            topics,
            skills,
            greeting,
            delays,
        }
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.kb
    }

    pub fn respond(&self, input: &str) -> Reply {
        let text = normalize(input);
        let (category, body, subject) = self.classify(&text);
        Reply {
            category,
            text: body,
            delay: self.delays.get(category),
            subject,
        }
    }

    fn classify(&self, text: &str) -> (ResponseCategory, String, Option<String>) {
        let kb = &self.kb;

        let is_greeting = self.greeting.as_ref().is_some_and(|re| re.is_match(text))
            || contains_any(text, GREETING_PHRASES);
        if is_greeting {
            return (ResponseCategory::Greeting, kb.greeting.clone(), None);
        }
        if contains_any(text, FAREWELL_PHRASES) {
            return (ResponseCategory::Farewell, kb.farewell.clone(), None);
        }
        if contains_any(text, GRATITUDE_PHRASES) {
            return (ResponseCategory::Gratitude, kb.gratitude.clone(), None);
        }
        if contains_any(text, PAGES_PHRASES) {
            return (ResponseCategory::Pages, self.pages_reply(), None);
        }
        if contains_any(text, PROFILE_PHRASES) {
            return (ResponseCategory::Profile, self.profile_reply(), None);
        }
        if contains_any(text, CONTACT_PHRASES) {
            return (ResponseCategory::Contact, self.contact_reply(), None);
        }
        if contains_any(text, SKILLS_LIST_PHRASES) {
            return (ResponseCategory::SkillsList, self.skills_list_reply(), None);
        }
        if let Some(skill) = self.match_skill(text) {
            return (
                ResponseCategory::Skill,
                skill_reply(skill),
                Some(skill.name.clone()),
            );
        }
        if let Some((index, score)) = self.best_topic(text) {
            let topic = &kb.topics[index];
            tracing::debug!("Matched topic '{}' with score {}", topic.id, score);
            return (ResponseCategory::Topic, topic_reply(topic), Some(topic.id.clone()));
        }
        (ResponseCategory::Fallback, self.fallback_reply(), None)
    }

    fn match_skill(&self, text: &str) -> Option<&Skill> {
        let by_name = self
            .skills
            .iter()
            .position(|s| s.names.iter().any(|n| contains_words(text, n)));
        let index = by_name.or_else(|| {
            self.skills
                .iter()
                .position(|s| contains_words(text, &s.category))
        })?;
        self.kb.skills.get(index)
    }

    /// Score of every topic, in declaration order.
    pub fn score_topics(&self, text: &str) -> Vec<u32> {
        let words = tokens(text);
        self.topics
            .iter()
            .map(|topic| {
                let mut score = 0;
                for keyword in &topic.keywords {
                    if text.contains(keyword.as_str()) {
                        score += if keyword.contains(' ') {
                            PHRASE_KEYWORD_WEIGHT
                        } else {
                            WORD_KEYWORD_WEIGHT
                        };
                    }
                }
                for word in &words {
                    if topic.keywords.iter().any(|k| k.contains(word)) {
                        score += 1;
                    }
                    if topic.facts.iter().any(|f| f.contains(word)) {
                        score += 1;
                    }
                }
                score
            })
            .collect()
    }

    /// Index and score of the first topic reaching the highest score, if above the threshold.
    pub fn best_topic(&self, text: &str) -> Option<(usize, u32)> {
        let mut best: Option<(usize, u32)> = None;
        for (index, score) in self.score_topics(text).into_iter().enumerate() {
            if score > best.map_or(0, |(_, s)| s) {
                best = Some((index, score));
            }
        }
        best.filter(|(_, score)| *score >= MIN_TOPIC_SCORE)
    }

    fn pages_reply(&self) -> String {
        let sections: Vec<String> = self
            .kb
            .topics
            .iter()
            .map(|t| format!("{} ({})", t.title, t.route))
            .collect();
        format!(
            "This portfolio is organised into these sections: {}.",
            sections.join(", ")
        )
    }

    fn profile_reply(&self) -> String {
        let p = &self.kb.profile;
        format!(
            "I'm {}, the on-page assistant for {}, {}, based in {}. {}",
            p.assistant_name, p.name, p.title, p.location, p.summary
        )
    }

    fn contact_reply(&self) -> String {
        let c = &self.kb.contact;
        format!(
            "You can reach {} by email at {}, by phone on {}, on WhatsApp at {}, or on LinkedIn at {}. Ongoing work lives on GitHub at {}.",
            self.kb.profile.name, c.email, c.phone, c.whatsapp, c.linkedin, c.github
        )
    }

    fn skills_list_reply(&self) -> String {
        let skills: Vec<String> = self
            .kb
            .skills
            .iter()
            .map(|s| format!("{} ({})", s.name, s.category))
            .collect();
        format!(
            "Skills tracked here: {}. Ask about any of them for details.",
            skills.join(", ")
        )
    }

    fn fallback_reply(&self) -> String {
        format!("{} {}.", self.kb.fallback, self.kb.section_titles().join(", "))
    }
}

fn skill_reply(skill: &Skill) -> String {
    format!("{}: {} {}", skill.name, skill.narrative, skill.usage)
}

fn topic_reply(topic: &KnowledgeTopic) -> String {
    let mut parts = vec![topic.summary.clone()];
    parts.extend(topic.facts.iter().take(TOPIC_FACTS_IN_REPLY).cloned());
    parts.push(format!(
        "You can read more on the {} page at {}.",
        topic.title, topic.route
    ));
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn responder() -> Responder {
        Responder::new(KnowledgeBase::builtin().unwrap(), ResponseDelays::default())
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Hello,   WORLD!! "), "hello world");
        assert_eq!(normalize("CI/CD-pipelines"), "ci cd pipelines");
        assert_eq!(normalize("?!."), "");
    }

    #[test]
    fn test_tokens_drop_short_words() {
        assert_eq!(tokens("tell me about a ci page"), vec!["tell", "about", "page"]);
    }

    #[test]
    fn test_hello_is_a_greeting() {
        let reply = responder().respond("hello");
        assert_eq!(reply.category, ResponseCategory::Greeting);
        assert_eq!(reply.delay, Duration::from_millis(150));
        assert!(reply.subject.is_none());
    }

    #[test]
    fn test_greeting_needs_word_boundary() {
        let r = responder();
        assert_eq!(r.respond("Hey!").category, ResponseCategory::Greeting);
        assert_eq!(r.respond("Good evening there").category, ResponseCategory::Greeting);
        assert_ne!(r.respond("history of this site").category, ResponseCategory::Greeting);
    }

    #[test]
    fn test_intent_precedence() {
        let r = responder();
        // greeting wins over farewell
        assert_eq!(r.respond("hi, bye").category, ResponseCategory::Greeting);
        // farewell wins over gratitude
        assert_eq!(r.respond("thanks, see you later").category, ResponseCategory::Farewell);
        assert_eq!(r.respond("Thank you!").category, ResponseCategory::Gratitude);
        assert_eq!(r.respond("Which pages exist?").category, ResponseCategory::Pages);
        assert_eq!(r.respond("who are you").category, ResponseCategory::Profile);
        assert_eq!(r.respond("what is your email").category, ResponseCategory::Contact);
        assert_eq!(r.respond("list all skills").category, ResponseCategory::SkillsList);
        assert_eq!(r.respond("do you know SQL?").category, ResponseCategory::Skill);
    }

    #[test]
    fn test_skill_names_match_whole_words() {
        let r = responder();
        let reply = r.respond("tell me about c");
        assert_eq!(reply.category, ResponseCategory::Skill);
        assert_eq!(reply.subject.as_deref(), Some("C"));
        assert!(reply.text.starts_with("C: "));

        let alias = r.respond("how do you use github");
        assert_eq!(alias.subject.as_deref(), Some("Git & GitHub"));

        let category = r.respond("data & persistence");
        assert_eq!(category.subject.as_deref(), Some("SQL"));
    }

    #[test]
    fn test_security_page_question_matches_security_topic() {
        let r = responder();
        let reply = r.respond("tell me about your security page");
        assert_eq!(reply.category, ResponseCategory::Topic);
        assert_eq!(reply.subject.as_deref(), Some("security"));
        assert_eq!(reply.delay, Duration::from_millis(450));

        let topic = r.knowledge().topics.iter().find(|t| t.id == "security").unwrap();
        assert!(reply.text.starts_with(&topic.summary));
        for fact in topic.facts.iter().take(3) {
            assert!(reply.text.contains(fact.as_str()));
        }
        assert!(!reply.text.contains(topic.facts[3].as_str()));
        assert!(reply.text.ends_with("/security."));
    }

    #[test]
    fn test_gibberish_falls_back_to_section_list() {
        let r = responder();
        let reply = r.respond("asdkjasd");
        assert_eq!(reply.category, ResponseCategory::Fallback);
        assert_eq!(reply.delay, Duration::from_millis(550));
        for title in r.knowledge().section_titles() {
            assert!(reply.text.contains(title), "missing {}", title);
        }
    }

    #[test]
    fn test_scores_below_threshold_fall_back() {
        let r = responder();
        let text = normalize("show me notes");
        let best = r.score_topics(&text).into_iter().max().unwrap();
        assert!(best >= MIN_TOPIC_SCORE);

        let weak = normalize("hmm the thing");
        assert!(r.best_topic(&weak).is_none());
    }

    #[test]
    fn test_phrase_keywords_outweigh_words() {
        let r = responder();
        let scores = r.score_topics(&normalize("design for failure"));
        let architecture = r
            .knowledge()
            .topics
            .iter()
            .position(|t| t.id == "architecture")
            .unwrap();
        let (best, _) = r.best_topic(&normalize("design for failure")).unwrap();
        assert_eq!(best, architecture);
        assert!(scores[architecture] >= PHRASE_KEYWORD_WEIGHT);
    }

    #[test]
    fn test_ties_keep_earliest_topic() {
        let raw = r#"
            seed = "s"
            greeting = "g"
            farewell = "f"
            gratitude = "t"
            fallback = "fb"

            [profile]
            assistant_name = "A"
            name = "N"
            title = "T"
            location = "L"
            summary = "S"

            [contact]
            email = "e"
            phone = "p"
            whatsapp = "w"
            linkedin = "l"
            github = "g"

            [[topics]]
            id = "first"
            title = "First"
            route = "/first"
            keywords = ["kubernetes"]
            summary = "one"

            [[topics]]
            id = "second"
            title = "Second"
            route = "/second"
            keywords = ["kubernetes"]
            summary = "two"
        "#;
        let r = Responder::new(KnowledgeBase::from_toml_str(raw).unwrap(), ResponseDelays::default());
        let reply = r.respond("kubernetes");
        assert_eq!(reply.subject.as_deref(), Some("first"));
        assert_eq!(r.score_topics("kubernetes"), vec![3, 3]);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let r = responder();
        let first = r.respond("How do you run CI/CD and monitoring?");
        for _ in 0..5 {
            assert_eq!(r.respond("How do you run CI/CD and monitoring?"), first);
        }
        assert_eq!(first.subject.as_deref(), Some("devops"));
    }

    #[test]
    fn test_delays_are_configurable_per_category() {
        let mut delays = ResponseDelays::default();
        delays.set(ResponseCategory::Greeting, Duration::from_millis(5));
        let r = Responder::new(KnowledgeBase::builtin().unwrap(), delays);
        assert_eq!(r.respond("hi").delay, Duration::from_millis(5));
        assert_eq!(r.respond("bye").delay, Duration::from_millis(200));
    }
}
