use rand::{seq::SliceRandom, Rng};
use regex::Regex;

const ANSWERS: [&str; 20] = [
    "It is certain.",
    "It is decidedly so.",
    "Without a doubt.",
    "Yes definitely.",
    "You may rely on it.",
    "As I see it, yes.",
    "Most likely.",
    "Outlook good.",
    "Yes.",
    "Signs point to yes.",
    "Reply hazy, try again.",
    "Ask again later.",
    "Better not tell you now.",
    "Cannot predict now.",
    "Concentrate and ask again.",
    "Don't count on it.",
    "My reply is no.",
    "My sources say no.",
    "Outlook not so good.",
    "Very doubtful.",
];

const SNARK: [&str; 4] = [
    "Did you hear something?",
    "You forgot the question.",
    "Try adding a question next time.",
    "Try again, dipshit.",
];

pub const MAX_DICE: u32 = 100;
pub const MIN_SIDES: u32 = 2;
pub const MAX_SIDES: u32 = 1000;

pub const ROLL_USAGE: &str =
    "Usage: `/roll NdM`, e.g. `2d6`. Up to 100 dice with 2 to 1000 sides each.";

pub fn eight_ball(question: Option<&str>, rng: &mut impl Rng) -> String {
    match question.map(str::trim).filter(|q| !q.is_empty()) {
        Some(_) => format!("🎱 {}", ANSWERS.choose(rng).copied().unwrap_or(ANSWERS[0])),
        None => SNARK.choose(rng).copied().unwrap_or(SNARK[0]).to_string(),
    }
}

pub fn coinflip(rng: &mut impl Rng) -> String {
    let side = if rng.gen_bool(0.5) { "Heads." } else { "Tails." };
    format!(":coin: {}", side)
}

/// Rolls `NdM` dice (default `1d6`). Malformed or out-of-range input yields
/// the usage text.
pub fn roll(dice: Option<&str>, rng: &mut impl Rng) -> String {
    let dice = dice.map(str::trim).filter(|d| !d.is_empty()).unwrap_or("1d6");

    let Some((count, sides)) = parse_dice(dice) else {
        return ROLL_USAGE.to_string();
    };

    let rolls: Vec<u32> = (0..count).map(|_| rng.gen_range(1..=sides)).collect();
    let total: u32 = rolls.iter().sum();

    if count == 1 {
        return format!("🎲 Rolled {}d{}: **{}**", count, sides, total);
    }

    let listed = rolls
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("🎲 Rolled {}d{}: {} (total **{}**)", count, sides, listed, total)
}

fn parse_dice(dice: &str) -> Option<(u32, u32)> {
    let pattern = Regex::new(r"^(?i)\s*(\d*)\s*d\s*(\d+)\s*$").ok()?;
    let captures = pattern.captures(dice)?;
    let count = match captures.get(1).map(|m| m.as_str()) {
        None | Some("") => 1,
        Some(n) => n.parse().ok()?,
    };
    let sides: u32 = captures.get(2)?.as_str().parse().ok()?;

    let in_range = (1..=MAX_DICE).contains(&count) && (MIN_SIDES..=MAX_SIDES).contains(&sides);
    in_range.then_some((count, sides))
}
