//! Demo Setup
//!
//! Creates the four factions of the demo city, their starting treasuries and
//! the scripted moves the headless runner plays each turn.

use covert_events::FactionId;

use crate::alliances::AllianceType;
use crate::engine::CovertEngine;
use crate::error::CovertResult;
use crate::ledger::{FactionLedgers, FactionResources, ResourceKind};
use crate::operations::{OperationKind, OperationPayload, OperationRequest};
use crate::rng::RandomSource;
use crate::spy_network::{AgentType, MissionSpec, MissionType, RecruitmentMethod, RecruitmentProfile};
use crate::turn::FactionState;

/// Owner of the demo spy network
pub const NETWORK_OWNER: &str = "red_hand";

/// Register the demo factions and open their ledger accounts
pub fn create_factions<R: RandomSource>(engine: &mut CovertEngine<R>) -> FactionLedgers {
    let mut ledgers = FactionLedgers::new();

    // === RED HAND ===
    // An underground cell network; runs the city's only spy ring
    engine.register_faction(NETWORK_OWNER);
    ledgers.open_account(NETWORK_OWNER, FactionResources::new(120.0, 40.0, 25.0));

    // === DOCKWORKERS ===
    // The harbor union, cash poor but with plenty of hands
    engine.register_faction("dockworkers");
    ledgers.open_account("dockworkers", FactionResources::new(60.0, 30.0, 80.0));

    // === STUDENT LEAGUE ===
    // Loud, idealistic and well connected in the press
    engine.register_faction("student_league");
    ledgers.open_account("student_league", FactionResources::new(40.0, 70.0, 30.0));

    // === CIVIC GUARD ===
    // The establishment's militia with a working counter-intelligence office
    engine.register_faction("civic_guard");
    ledgers.open_account("civic_guard", FactionResources::new(200.0, 50.0, 60.0));

    ledgers
}

/// Faction states reported to the engine every turn
pub fn faction_states() -> Vec<FactionState> {
    vec![
        FactionState::active(NETWORK_OWNER).with_counter_intelligence(0.2),
        FactionState::active("dockworkers"),
        FactionState::active("student_league").with_counter_intelligence(0.1),
        FactionState::active("civic_guard").with_counter_intelligence(0.6),
    ]
}

/// Opening moves: channels, the secret pact and the first recruits
pub fn open_demo<R: RandomSource>(engine: &mut CovertEngine<R>) -> CovertResult<()> {
    let owner = FactionId::from(NETWORK_OWNER);
    engine.form_alliance(
        &[owner.clone(), "dockworkers".into(), "student_league".into()],
        AllianceType::Secret,
        "Harbor Compact",
        Some(owner.clone()),
    )?;
    engine.establish_channel(&owner, &"civic_guard".into())?;

    let recruits = [
        RecruitmentProfile::new("Heron", AgentType::Handler, "harbor")
            .with_access(5)
            .with_skills(0.7, 0.7),
        RecruitmentProfile::new("Wren", AgentType::Informant, "harbor").with_cover("customs clerk"),
        RecruitmentProfile::new("Moth", AgentType::Infiltrator, "barracks")
            .with_cover("quartermaster")
            .with_access(6),
    ];
    for profile in &recruits {
        engine.recruit_agent(profile, RecruitmentMethod::Ideological, None)?;
    }
    Ok(())
}

/// Scripted actions for one turn of the demo
pub fn play_turn<R: RandomSource>(
    engine: &mut CovertEngine<R>,
    ledgers: &mut FactionLedgers,
    turn: u64,
) -> CovertResult<()> {
    let owner = FactionId::from(NETWORK_OWNER);

    if let Some(channel_id) = engine
        .channels()
        .find_channel(&owner, &"dockworkers".into())
        .map(|c| c.channel_id.clone())
    {
        engine.send_message(
            &channel_id,
            &owner,
            format!("turn {} orders", turn),
            Some(OperationKind::JointSabotage),
        )?;
    }

    match turn % 4 {
        0 => {
            let request = OperationRequest::new(
                owner.clone(),
                OperationPayload::CovertSupport {
                    resource: ResourceKind::Money,
                    amount: 10.0,
                },
            )
            .with_target("student_league");
            engine.execute_covert_operation(&request, ledgers)?;
        }
        1 => {
            let request = OperationRequest::new(
                owner.clone(),
                OperationPayload::JointSabotage {
                    target_asset: "customs house".to_string(),
                },
            )
            .with_target("civic_guard")
            .with_allies(vec!["dockworkers".into()]);
            engine.execute_covert_operation(&request, ledgers)?;
        }
        2 => {
            let agent_id = engine
                .network()
                .agents()
                .find(|a| a.agent_type != AgentType::Handler)
                .map(|a| a.agent_id.clone());
            if let Some(agent_id) = agent_id {
                let mission = MissionSpec::new(MissionType::Surveillance, 0.4).against("civic_guard");
                engine.assign_mission(&agent_id, &mission)?;
            }
        }
        _ => {
            engine.execute_named_operation("false_flag", &owner, Some(&"civic_guard".into()), &[], None, ledgers)?;
        }
    }

    if turn % 5 == 0 {
        let handler = engine
            .network()
            .agents()
            .find(|a| a.agent_type == AgentType::Handler)
            .map(|a| a.agent_id.clone());
        let profile = RecruitmentProfile::new(format!("Recruit-{}", turn), AgentType::Courier, "harbor");
        engine.recruit_agent(&profile, RecruitmentMethod::Financial, handler.as_ref())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CovertConfig;
    use crate::ledger::FactionLedger;

    #[test]
    fn test_create_factions() {
        let mut engine = CovertEngine::seeded(CovertConfig::default(), NETWORK_OWNER, 7);
        let ledgers = create_factions(&mut engine);
        assert_eq!(engine.factions().count(), 4);
        assert_eq!(
            ledgers.balance(&"civic_guard".into(), ResourceKind::Money),
            Some(200.0)
        );
        for state in faction_states() {
            assert!(engine.factions().any(|f| f == &state.faction_id));
        }
    }

    #[test]
    fn test_open_demo_builds_pact_and_channels() {
        let mut engine = CovertEngine::seeded(CovertConfig::default(), NETWORK_OWNER, 7);
        create_factions(&mut engine);
        open_demo(&mut engine).unwrap();
        assert_eq!(engine.alliances().len(), 1);
        // three pact pairs plus the line to the guard
        assert_eq!(engine.channels().len(), 4);
    }
}
